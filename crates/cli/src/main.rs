use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use rtpav::media::h264::{AnnexBReader, NaluType, PacketizationMode, START_CODE};
use rtpav::transport::udp::MAX_DATAGRAM_SIZE;
use rtpav::{
    EncodedImage, H264FrameAssembler, H264VideoSender, PayloadSizeLimits, SsrcRegistry,
    UdpTransport, VideoReceiverConfig, VideoRotation, VideoSenderConfig,
};

#[derive(Parser)]
#[command(name = "rtp-av", about = "Send and receive H.264 over RTP/UDP")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream an Annex B file to a UDP destination
    Send {
        /// Annex B (.h264) input file
        input: PathBuf,
        /// Destination address (host:port)
        #[arg(long, short)]
        dest: SocketAddr,
        /// Frames per second
        #[arg(long, default_value_t = 30)]
        fps: u32,
        /// RTP payload type
        #[arg(long, default_value_t = 100)]
        payload_type: u8,
        /// Largest RTP payload in bytes
        #[arg(long, default_value_t = 1200)]
        max_payload: usize,
        /// Use packetization-mode=0 (no STAP-A or FU-A)
        #[arg(long)]
        single_nal: bool,
        /// Send the video-orientation extension with this rotation (0, 90, 180, 270)
        #[arg(long)]
        rotation: Option<u16>,
        /// Restart from the beginning at end of file
        #[arg(long = "loop")]
        repeat: bool,
    },
    /// Receive RTP and write the reassembled Annex B stream
    Receive {
        /// Output file
        output: PathBuf,
        /// Bind address (host:port)
        #[arg(long, short, default_value = "0.0.0.0:5004")]
        bind: String,
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<usize>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let result = match args.command {
        Command::Send {
            input,
            dest,
            fps,
            payload_type,
            max_payload,
            single_nal,
            rotation,
            repeat,
        } => {
            let rotation = match rotation.map(VideoRotation::from_degrees) {
                Some(None) => {
                    eprintln!("rotation must be one of 0, 90, 180, 270");
                    return ExitCode::FAILURE;
                }
                Some(Some(rotation)) => Some(rotation),
                None => None,
            };
            let config = VideoSenderConfig {
                payload_type,
                limits: PayloadSizeLimits {
                    max_payload_len: max_payload,
                    ..Default::default()
                },
                mode: if single_nal {
                    PacketizationMode::SingleNalUnit
                } else {
                    PacketizationMode::NonInterleaved
                },
                video_rotation: rotation.map(|_| 1),
                ..Default::default()
            };
            send(&input, dest, fps.max(1), config, rotation.unwrap_or_default(), repeat)
        }
        Command::Receive {
            output,
            bind,
            frames,
        } => receive(&bind, &output, frames),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rtp-av: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Group NAL units into access units.
///
/// A new unit starts at an AUD, SPS, PPS or SEI, or at a slice whose
/// `first_mb_in_slice` is zero, once the current unit holds a slice.
fn split_access_units(data: &[u8]) -> Vec<Vec<u8>> {
    let mut reader = AnnexBReader::new(data);
    let mut units = Vec::new();
    let mut current = Vec::new();
    let mut has_slice = false;
    while let Some(nal) = reader.read_nal_unit() {
        let Some(&header) = nal.first() else {
            continue;
        };
        let nalu_type = NaluType::from_header(header);
        let is_vcl = nalu_type.is_some_and(NaluType::is_vcl);
        // ue(v) first_mb_in_slice is 0 iff its first bit is set
        let starts_picture = if is_vcl {
            nal.get(1).is_some_and(|&b| b & 0x80 != 0)
        } else {
            matches!(
                nalu_type,
                Some(NaluType::Aud | NaluType::Sps | NaluType::Pps | NaluType::Sei)
            )
        };
        if has_slice && starts_picture {
            units.push(std::mem::take(&mut current));
            has_slice = false;
        }
        current.extend_from_slice(&START_CODE);
        current.extend_from_slice(nal);
        has_slice |= is_vcl;
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}

fn send(
    input: &Path,
    dest: SocketAddr,
    fps: u32,
    config: VideoSenderConfig,
    rotation: VideoRotation,
    repeat: bool,
) -> rtpav::Result<()> {
    let data = std::fs::read(input)?;
    let access_units = split_access_units(&data);
    tracing::info!(path = %input.display(), access_units = access_units.len(), %dest, "sending");

    let registry = SsrcRegistry::new();
    let mut sender = H264VideoSender::new(config, &registry)?;
    let transport = UdpTransport::bind("0.0.0.0:0")?;
    let frame_interval = Duration::from_secs(1) / fps;
    let started = Instant::now();
    let mut frame_index: u32 = 0;

    loop {
        for access_unit in &access_units {
            let pts = frame_interval * frame_index;
            let mut image = EncodedImage::new(access_unit.clone(), pts);
            image.rotation = rotation;

            let packets = match sender.packetize(&image) {
                Ok(packets) => packets,
                Err(e) => {
                    tracing::warn!(error = %e, frame = frame_index, "frame skipped");
                    frame_index += 1;
                    continue;
                }
            };
            for packet in packets {
                transport.send_to(&packet?, dest)?;
            }
            if frame_index == 0 {
                for attribute in sender.sdp_attributes() {
                    tracing::info!("{attribute}");
                }
            }

            frame_index += 1;
            if let Some(wait) = (frame_interval * frame_index).checked_sub(started.elapsed()) {
                thread::sleep(wait);
            }
        }
        if !repeat {
            break;
        }
    }
    tracing::info!(frames = frame_index, "done");
    Ok(())
}

fn receive(bind: &str, output: &Path, frames: Option<usize>) -> rtpav::Result<()> {
    let transport = UdpTransport::bind(bind)?;
    let mut writer = BufWriter::new(File::create(output)?);
    let mut assembler = H264FrameAssembler::new(VideoReceiverConfig::default());
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut written = 0;
    let local_addr = transport.local_addr()?;
    tracing::info!(%local_addr, path = %output.display(), "receiving");

    while frames.is_none_or(|limit| written < limit) {
        let (len, _) = transport.recv_from(&mut buf)?;
        let Some(frame) = assembler.received(&buf[..len]) else {
            continue;
        };
        if frame.is_placeholder() {
            tracing::debug!(timestamp_ms = frame.timestamp_ms, "placeholder frame skipped");
            continue;
        }
        writer.write_all(&frame.data)?;
        written += 1;
        tracing::debug!(
            timestamp_ms = frame.timestamp_ms,
            size = frame.data.len(),
            rotation = frame.rotation.degrees(),
            "frame written"
        );
    }
    writer.flush()?;
    tracing::info!(frames = written, "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annexb(nals: &[&[u8]]) -> Vec<u8> {
        nals.iter().flat_map(|nal| START_CODE.iter().chain(nal.iter())).copied().collect()
    }

    #[test]
    fn slices_of_one_picture_stay_together() {
        let sps: &[u8] = &[0x67, 0x42, 0xE0, 0x1F];
        let pps: &[u8] = &[0x68, 0xCE, 0x3C];
        let first_slice: &[u8] = &[0x65, 0x88, 0x01];
        let second_slice: &[u8] = &[0x65, 0x40, 0x02];
        let next_picture: &[u8] = &[0x41, 0x9A, 0x03];
        let stream = annexb(&[sps, pps, first_slice, second_slice, next_picture]);

        let units = split_access_units(&stream);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], annexb(&[sps, pps, first_slice, second_slice]));
        assert_eq!(units[1], annexb(&[next_picture]));
    }

    #[test]
    fn parameter_sets_open_a_new_unit() {
        let slice: &[u8] = &[0x41, 0x9A, 0x01];
        let sps: &[u8] = &[0x67, 0x42, 0xE0, 0x1F];
        let idr: &[u8] = &[0x65, 0x88, 0x02];
        let units = split_access_units(&annexb(&[slice, sps, idr]));
        assert_eq!(units, vec![annexb(&[slice]), annexb(&[sps, idr])]);
    }
}
