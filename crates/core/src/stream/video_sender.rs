use std::time::Duration;

use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::error::{Error, Result};
use crate::frame::{EncodedImage, VideoRotation};
use crate::media::extension::{ExtensionMap, RtpExtensionType, VideoOrientation};
use crate::media::h264::{
    self, H264Packetizer, NaluType, PacketizationMode, ProfileLevelId, find_nalu_indices,
};
use crate::media::rtp::{DEFAULT_PACKET_SIZE, RtpPacket};
use crate::media::{Packetizer, PayloadSizeLimits};
use crate::ssrc::SsrcRegistry;

const MS_TO_VIDEO_TIMESTAMP: u32 = h264::CLOCK_RATE / 1000;

/// Video sender parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSenderConfig {
    /// Dynamic RTP payload type (RFC 3551 §6).
    pub payload_type: u8,
    /// Largest serialized RTP packet.
    pub packet_capacity: usize,
    pub limits: PayloadSizeLimits,
    pub mode: PacketizationMode,
    /// Extension id for the video-orientation extension, if it is sent.
    pub video_rotation: Option<u8>,
}

impl Default for VideoSenderConfig {
    fn default() -> Self {
        Self {
            payload_type: 100,
            packet_capacity: DEFAULT_PACKET_SIZE,
            limits: PayloadSizeLimits::default(),
            mode: PacketizationMode::NonInterleaved,
            video_rotation: None,
        }
    }
}

/// Sends one H.264 stream as RTP.
///
/// Owns the stream's SSRC (drawn from the registry on creation, returned
/// on drop), sequence number and 90 kHz timestamp.
#[derive(Debug)]
pub struct H264VideoSender {
    config: VideoSenderConfig,
    registry: SsrcRegistry,
    ssrc: u32,
    sequence_number: u16,
    timestamp: u32,
    previous_pts: Option<Duration>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl H264VideoSender {
    /// Fails when a full-size payload plus the RTP header (and rotation
    /// extension, if configured) would not fit in `packet_capacity`.
    pub fn new(config: VideoSenderConfig, registry: &SsrcRegistry) -> Result<Self> {
        let overhead = header_overhead(&config)?;
        if overhead + config.limits.max_payload_len > config.packet_capacity {
            return Err(Error::Packetization(format!(
                "payloads of {} bytes plus {overhead} header bytes exceed packet capacity {}",
                config.limits.max_payload_len, config.packet_capacity
            )));
        }
        let ssrc = registry.generate()?;
        tracing::info!(
            ssrc = format_args!("{:#010X}", ssrc),
            payload_type = config.payload_type,
            mode = ?config.mode,
            "video sender created"
        );
        Ok(Self {
            config,
            registry: registry.clone(),
            ssrc,
            sequence_number: 0,
            timestamp: 0,
            previous_pts: None,
            sps: None,
            pps: None,
        })
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Sequence number the next packet will carry.
    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    /// RTP timestamp of the most recent frame.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn config(&self) -> &VideoSenderConfig {
        &self.config
    }

    /// Packetize one access unit.
    ///
    /// The returned iterator yields serialized RTP packets lazily; packets
    /// not pulled from it are never sent and do not consume sequence
    /// numbers. The timestamp advances by the presentation-time delta
    /// (in 90 kHz units) from the second frame on.
    pub fn packetize<'a>(&'a mut self, image: &'a EncodedImage) -> Result<VideoPackets<'a>> {
        if let Some(previous) = self.previous_pts {
            let delta_ms = image
                .presentation_timestamp
                .saturating_sub(previous)
                .as_millis() as u32;
            self.timestamp = self
                .timestamp
                .wrapping_add(delta_ms.wrapping_mul(MS_TO_VIDEO_TIMESTAMP));
        }
        self.previous_pts = Some(image.presentation_timestamp);
        self.capture_parameter_sets(&image.buffer);

        let packetizer =
            H264Packetizer::new(&image.buffer, self.config.limits, self.config.mode)?;
        tracing::trace!(
            ssrc = format_args!("{:#010X}", self.ssrc),
            timestamp = self.timestamp,
            packets = packetizer.num_packets(),
            size = image.buffer.len(),
            "frame packetized"
        );
        Ok(VideoPackets {
            sender: self,
            packetizer,
            rotation: image.rotation,
            failed: false,
        })
    }

    /// Remember the latest SPS/PPS for SDP.
    fn capture_parameter_sets(&mut self, access_unit: &[u8]) {
        for nalu in find_nalu_indices(access_unit) {
            let nal = nalu.payload(access_unit);
            let Some(&header) = nal.first() else {
                continue;
            };
            let slot = match NaluType::from_header(header) {
                Some(NaluType::Sps) => &mut self.sps,
                Some(NaluType::Pps) => &mut self.pps,
                _ => continue,
            };
            if slot.as_deref() != Some(nal) {
                tracing::debug!(
                    nal_type = header & h264::nal::NAL_TYPE_MASK,
                    size = nal.len(),
                    "parameter set captured"
                );
                *slot = Some(nal.to_vec());
            }
        }
    }

    /// Profile and level of the most recent SPS, when recognized.
    pub fn profile_level_id(&self) -> Option<ProfileLevelId> {
        self.sps.as_deref().and_then(ProfileLevelId::from_sps)
    }

    /// Value of the SDP `a=fmtp` line (RFC 6184 §8.1).
    ///
    /// `profile-level-id` and `sprop-parameter-sets` appear once an SPS
    /// (and PPS) have passed through [`packetize`](Self::packetize).
    pub fn sdp_fmtp(&self) -> String {
        let mut fmtp = format!("packetization-mode={}", self.config.mode.sdp_value());
        if let Some(sps) = self.sps.as_deref().filter(|sps| sps.len() >= 4) {
            fmtp.push_str(&format!(
                ";{}={:02x}{:02x}{:02x}",
                h264::profile::PROFILE_LEVEL_ID,
                sps[1],
                sps[2],
                sps[3]
            ));
        }
        if let (Some(sps), Some(pps)) = (&self.sps, &self.pps) {
            fmtp.push_str(&format!(
                ";sprop-parameter-sets={},{}",
                BASE64_STANDARD.encode(sps),
                BASE64_STANDARD.encode(pps)
            ));
        }
        fmtp
    }

    /// SDP media attributes for this stream.
    pub fn sdp_attributes(&self) -> Vec<String> {
        let pt = self.config.payload_type;
        let mut attributes = vec![
            format!("a=rtpmap:{pt} H264/{}", h264::CLOCK_RATE),
            format!("a=fmtp:{pt} {}", self.sdp_fmtp()),
        ];
        if let Some(id) = self.config.video_rotation {
            let mut map = ExtensionMap::empty();
            if map.register(RtpExtensionType::VideoRotation, id) {
                attributes.extend(map.sdp_attributes());
            }
        }
        attributes
    }

    fn next_rtp_packet(&mut self, rotation: VideoRotation) -> Result<RtpPacket> {
        let mut packet = RtpPacket::with_capacity(self.config.packet_capacity);
        packet.set_ssrc(self.ssrc);
        packet.set_sequence_number(self.sequence_number);
        packet.set_payload_type(self.config.payload_type);
        packet.set_timestamp(self.timestamp);
        if let Some(id) = self.config.video_rotation {
            let value = packet.allocate_extension(id, VideoOrientation::VALUE_SIZE)?;
            VideoOrientation::write(value, rotation);
        }
        Ok(packet)
    }
}

/// Bytes every packet spends before its payload.
fn header_overhead(config: &VideoSenderConfig) -> Result<usize> {
    let mut packet = RtpPacket::with_capacity(config.packet_capacity);
    if let Some(id) = config.video_rotation {
        packet.allocate_extension(id, VideoOrientation::VALUE_SIZE)?;
    }
    Ok(packet.len())
}

impl Drop for H264VideoSender {
    fn drop(&mut self) {
        self.registry.release(self.ssrc);
    }
}

/// Lazily built RTP packets of one access unit.
#[derive(Debug)]
pub struct VideoPackets<'a> {
    sender: &'a mut H264VideoSender,
    packetizer: H264Packetizer<'a>,
    rotation: VideoRotation,
    failed: bool,
}

impl VideoPackets<'_> {
    /// Packets still to be produced.
    pub fn remaining(&self) -> usize {
        if self.failed { 0 } else { self.packetizer.num_packets() }
    }
}

impl Iterator for VideoPackets<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.packetizer.num_packets() == 0 {
            return None;
        }
        let built = self
            .sender
            .next_rtp_packet(self.rotation)
            .and_then(|mut packet| {
                self.packetizer
                    .next_packet(&mut packet)
                    .map(|produced| produced.then_some(packet))
            });
        match built {
            Ok(Some(packet)) => {
                self.sender.sequence_number = self.sender.sequence_number.wrapping_add(1);
                Some(Ok(packet.into_bytes()))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}
