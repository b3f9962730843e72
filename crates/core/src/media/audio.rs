//! Audio payload formats.
//!
//! - **AMR-WB** (RFC 4867): the codec frame prefixed with a single
//!   payload-header byte `0xF0` (CMR=15, no mode request). The receiver
//!   strips the first byte.
//! - **G.711** (RFC 3551 §4.5.14): samples are the payload, unmodified.
//!
//! Both formats put one 20 ms frame in each RTP packet.

use crate::error::Result;
use crate::media::Packetizer;
use crate::media::rtp::RtpPacket;

/// AMR-WB payload header: CMR=15 (no mode request), no reserved bits.
pub const AMR_WB_PAYLOAD_HEADER: u8 = 0xF0;

/// Audio codecs the RTP layer knows how to frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioCodecType {
    #[default]
    AmrWb,
    G711,
}

impl AudioCodecType {
    /// RTP clock rate, equal to the sampling rate.
    pub fn clock_rate(self) -> u32 {
        match self {
            Self::AmrWb => 16_000,
            Self::G711 => 8_000,
        }
    }

    /// Bytes of 16-bit PCM in one 20 ms frame.
    pub fn frame_bytes(self) -> usize {
        match self {
            Self::AmrWb => 640,
            Self::G711 => 320,
        }
    }

    /// RTP timestamp advance per frame.
    pub fn samples_per_frame(self) -> u32 {
        (self.frame_bytes() / 2) as u32
    }

    /// Conventional payload type: dynamic for AMR-WB, static PCMU for G.711.
    pub fn default_payload_type(self) -> u8 {
        match self {
            Self::AmrWb => 97,
            Self::G711 => 0,
        }
    }

    /// Remove the payload framing added by [`AudioPacketizer`].
    pub fn depacketize(self, payload: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::AmrWb => payload.get(1..).map(<[u8]>::to_vec),
            Self::G711 => Some(payload.to_vec()),
        }
    }
}

/// Encodes one frame of 16-bit little-endian PCM.
pub trait AudioEncoder: Send {
    fn codec_type(&self) -> AudioCodecType;

    fn encode(&mut self, pcm: &[u8]) -> Result<Vec<u8>>;
}

/// Decodes one codec frame to 16-bit little-endian PCM.
pub trait AudioDecoder: Send {
    fn codec_type(&self) -> AudioCodecType;

    fn decode(&mut self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Frames one encoded audio frame into a single RTP payload.
#[derive(Debug)]
pub struct AudioPacketizer<'a> {
    codec: AudioCodecType,
    payload: &'a [u8],
    done: bool,
}

impl<'a> AudioPacketizer<'a> {
    pub fn new(codec: AudioCodecType, payload: &'a [u8]) -> Self {
        Self {
            codec,
            payload,
            done: payload.is_empty(),
        }
    }
}

impl Packetizer for AudioPacketizer<'_> {
    fn next_packet(&mut self, packet: &mut RtpPacket) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        if self.codec == AudioCodecType::AmrWb {
            packet.append_payload(&[AMR_WB_PAYLOAD_HEADER])?;
        }
        packet.append_payload(self.payload)?;
        self.done = true;
        Ok(true)
    }

    fn num_packets(&self) -> usize {
        usize::from(!self.done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_parameters() {
        assert_eq!(AudioCodecType::AmrWb.frame_bytes(), 640);
        assert_eq!(AudioCodecType::AmrWb.samples_per_frame(), 320);
        assert_eq!(AudioCodecType::AmrWb.clock_rate(), 16_000);
        assert_eq!(AudioCodecType::G711.frame_bytes(), 320);
        assert_eq!(AudioCodecType::G711.samples_per_frame(), 160);
        assert_eq!(AudioCodecType::G711.clock_rate(), 8_000);
    }

    #[test]
    fn amr_wb_prefix_roundtrip() {
        let frame = [0x11, 0x22, 0x33];
        let mut p = AudioPacketizer::new(AudioCodecType::AmrWb, &frame);
        assert_eq!(p.num_packets(), 1);
        let mut packet = RtpPacket::new();
        assert!(p.next_packet(&mut packet).unwrap());
        assert_eq!(packet.payload(), &[0xF0, 0x11, 0x22, 0x33]);
        assert!(!p.next_packet(&mut RtpPacket::new()).unwrap());
        assert_eq!(p.num_packets(), 0);

        assert_eq!(
            AudioCodecType::AmrWb.depacketize(packet.payload()),
            Some(frame.to_vec())
        );
        assert_eq!(AudioCodecType::AmrWb.depacketize(&[]), None);
    }

    #[test]
    fn g711_passthrough() {
        let frame = [0xD5; 160];
        let mut p = AudioPacketizer::new(AudioCodecType::G711, &frame);
        let mut packet = RtpPacket::new();
        assert!(p.next_packet(&mut packet).unwrap());
        assert_eq!(packet.payload(), &frame[..]);
        assert_eq!(AudioCodecType::G711.depacketize(&frame), Some(frame.to_vec()));
    }

    #[test]
    fn empty_frame_produces_nothing() {
        let mut p = AudioPacketizer::new(AudioCodecType::AmrWb, &[]);
        assert_eq!(p.num_packets(), 0);
        assert!(!p.next_packet(&mut RtpPacket::new()).unwrap());
    }
}
