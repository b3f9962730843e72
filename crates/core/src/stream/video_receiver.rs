use std::cmp::Reverse;

use super::{seq_distance, seq_is_newer, timestamp_to_ms};
use crate::frame::VideoPacket;
use crate::media::extension::VideoOrientation;
use crate::media::h264::{self, H264Depacketizer, NaluType, PacketizationType, START_CODE};
use crate::media::rtp::RtpPacket;

/// Video receiver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoReceiverConfig {
    /// Extension id the sender uses for video orientation.
    pub rotation_extension_id: u8,
    /// Largest sequence-number gap over which packets are reordered.
    pub reorder_distance: u16,
    /// Oldest packets are evicted past this many.
    pub max_buffered_packets: usize,
}

impl Default for VideoReceiverConfig {
    fn default() -> Self {
        Self {
            rotation_extension_id: 1,
            reorder_distance: 30,
            max_buffered_packets: 512,
        }
    }
}

/// Rebuilds Annex B access units from the RTP packets of one H.264 stream.
///
/// Packets are held in a window ordered by sequence number until the
/// marker packet of a frame arrives. The frame is then emitted when its
/// packets form one unbroken run, and dropped otherwise. Slices that
/// arrive before any SPS/PPS produce an empty placeholder frame.
///
/// ```text
/// idle ──first packet──► accumulating ──marker──► emit | drop ──► idle
/// ```
#[derive(Debug, Default)]
pub struct H264FrameAssembler {
    config: VideoReceiverConfig,
    depacketizer: H264Depacketizer,
    window: Vec<RtpPacket>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
    last_flushed: Option<u16>,
}

impl H264FrameAssembler {
    pub fn new(config: VideoReceiverConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Packets waiting for their frame's marker.
    pub fn buffered(&self) -> usize {
        self.window.len()
    }

    /// Forget buffered packets and parameter sets.
    pub fn reset(&mut self) {
        self.window.clear();
        self.sps = None;
        self.pps = None;
        self.last_flushed = None;
    }

    /// Feed one RTP packet. Returns a frame when this packet completes one.
    pub fn received(&mut self, data: &[u8]) -> Option<VideoPacket> {
        let packet = match RtpPacket::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, len = data.len(), "malformed RTP packet dropped");
                return None;
            }
        };
        let seq = packet.sequence_number();

        if let Some(last) = self.last_flushed {
            if last.wrapping_sub(seq) < self.config.reorder_distance {
                tracing::warn!(seq, last_flushed = last, "late packet dropped");
                return None;
            }
        }
        if self.window.iter().any(|p| p.sequence_number() == seq) {
            tracing::warn!(seq, "duplicate packet dropped");
            return None;
        }

        let marker = packet.marker();
        self.insert(packet);
        if self.window.len() > self.config.max_buffered_packets {
            let evicted = self.window.remove(0);
            tracing::warn!(
                seq = evicted.sequence_number(),
                buffered = self.window.len(),
                "reorder window full, oldest packet evicted"
            );
        }

        if marker { self.flush(seq) } else { None }
    }

    fn insert(&mut self, packet: RtpPacket) {
        let seq = packet.sequence_number();
        let distance = self.config.reorder_distance;
        let position = self.window.iter().position(|p| {
            let other = p.sequence_number();
            seq_distance(other, seq) < distance && seq_is_newer(other, seq)
        });
        match position {
            Some(index) => self.window.insert(index, packet),
            None => self.window.push(packet),
        }
        tracing::trace!(seq, buffered = self.window.len(), "packet buffered");
    }

    /// Take every buffered packet up to `marker_seq` and rebuild the frame.
    fn flush(&mut self, marker_seq: u16) -> Option<VideoPacket> {
        let (mut frame, rest): (Vec<RtpPacket>, Vec<RtpPacket>) = std::mem::take(&mut self.window)
            .into_iter()
            .partition(|p| !seq_is_newer(p.sequence_number(), marker_seq));
        self.window = rest;
        self.last_flushed = Some(marker_seq);

        frame.sort_by_key(|p| Reverse(marker_seq.wrapping_sub(p.sequence_number())));
        if frame.last().map(RtpPacket::sequence_number) != Some(marker_seq) {
            return None;
        }
        if let Some(gap) = frame
            .windows(2)
            .find(|pair| pair[1].sequence_number() != pair[0].sequence_number().wrapping_add(1))
        {
            tracing::warn!(
                first = frame[0].sequence_number(),
                marker = marker_seq,
                after = gap[0].sequence_number(),
                next = gap[1].sequence_number(),
                "packet loss, frame dropped"
            );
            return None;
        }

        self.assemble(&frame)
    }

    fn assemble(&mut self, frame: &[RtpPacket]) -> Option<VideoPacket> {
        let marker = frame.last()?;
        let mut data = Vec::new();
        let mut missing_parameter_sets = false;
        let mut parameter_sets_written = false;
        let mut nal_open = false;
        // SPS/PPS split over FU-A, complete once the next NAL unit starts
        let mut fragmented_parameter_set: Option<(NaluType, Vec<u8>)> = None;

        'packets: for packet in frame {
            for parsed in self.depacketizer.parse(packet.payload()) {
                let is_start = parsed.is_first_packet_in_frame;
                if is_start {
                    if let Some((kind, nal)) = fragmented_parameter_set.take() {
                        self.store_parameter_set(kind, nal);
                    }
                }
                match parsed.nalu_type {
                    NaluType::Sps | NaluType::Pps => {
                        nal_open = false;
                        if parsed.packetization != PacketizationType::FuA {
                            self.store_parameter_set(parsed.nalu_type, parsed.payload);
                        } else if is_start {
                            fragmented_parameter_set = Some((parsed.nalu_type, parsed.payload));
                        } else if let Some((kind, nal)) = &mut fragmented_parameter_set {
                            if *kind == parsed.nalu_type {
                                nal.extend_from_slice(&parsed.payload);
                            }
                        }
                    }
                    NaluType::Idr | NaluType::Slice => {
                        let (Some(sps), Some(pps)) = (&self.sps, &self.pps) else {
                            missing_parameter_sets = true;
                            break 'packets;
                        };
                        if is_start {
                            if parsed.nalu_type == NaluType::Idr && !parameter_sets_written {
                                data.extend_from_slice(&START_CODE);
                                data.extend_from_slice(sps);
                                data.extend_from_slice(&START_CODE);
                                data.extend_from_slice(pps);
                                parameter_sets_written = true;
                            }
                            data.extend_from_slice(&START_CODE);
                            nal_open = true;
                        } else if !nal_open {
                            tracing::debug!(
                                seq = packet.sequence_number(),
                                "fragment without start dropped"
                            );
                            continue;
                        }
                        data.extend_from_slice(&parsed.payload);
                    }
                    _ => {
                        if is_start {
                            nal_open = false;
                        }
                    }
                }
            }
        }

        if let Some((kind, nal)) = fragmented_parameter_set {
            self.store_parameter_set(kind, nal);
        }

        let timestamp_ms = timestamp_to_ms(marker.timestamp(), h264::CLOCK_RATE);
        let rotation = marker
            .find_extension(self.config.rotation_extension_id)
            .and_then(VideoOrientation::parse)
            .unwrap_or_default();

        if missing_parameter_sets {
            tracing::warn!(
                seq = marker.sequence_number(),
                timestamp_ms,
                "slice before parameter sets, placeholder emitted"
            );
            return Some(VideoPacket {
                timestamp_ms,
                data: Vec::new(),
                rotation,
            });
        }
        if data.is_empty() {
            return None;
        }
        tracing::trace!(
            seq = marker.sequence_number(),
            timestamp_ms,
            size = data.len(),
            packets = frame.len(),
            "frame assembled"
        );
        Some(VideoPacket {
            timestamp_ms,
            data,
            rotation,
        })
    }
}

impl H264FrameAssembler {
    fn store_parameter_set(&mut self, kind: NaluType, nal: Vec<u8>) {
        let (slot, name) = if kind == NaluType::Sps {
            (&mut self.sps, "SPS")
        } else {
            (&mut self.pps, "PPS")
        };
        if slot.as_deref() != Some(nal.as_slice()) {
            tracing::debug!(size = nal.len(), "{name} updated");
            *slot = Some(nal);
        }
    }
}
