use super::{seq_is_newer, timestamp_to_ms};
use crate::frame::AudioPacket;
use crate::media::audio::AudioCodecType;
use crate::media::rtp::RtpPacket;

/// Unwraps the RTP packets of one audio stream.
///
/// Audio is played as it arrives, so nothing is buffered: duplicates are
/// dropped, while gaps and late packets are only logged.
#[derive(Debug, Clone, Default)]
pub struct AudioReceiver {
    codec: AudioCodecType,
    previous_seq: Option<u16>,
}

impl AudioReceiver {
    pub fn new(codec: AudioCodecType) -> Self {
        Self {
            codec,
            previous_seq: None,
        }
    }

    pub fn codec(&self) -> AudioCodecType {
        self.codec
    }

    pub fn reset(&mut self) {
        self.previous_seq = None;
    }

    /// Feed one RTP packet and get its codec frame back.
    pub fn received(&mut self, data: &[u8]) -> Option<AudioPacket> {
        let packet = match RtpPacket::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, len = data.len(), "malformed RTP packet dropped");
                return None;
            }
        };
        let seq = packet.sequence_number();

        match self.previous_seq {
            Some(previous) if previous == seq => {
                tracing::warn!(seq, "duplicate audio packet dropped");
                return None;
            }
            Some(previous) if seq_is_newer(seq, previous) => {
                let lost = seq.wrapping_sub(previous) - 1;
                if lost > 0 {
                    tracing::warn!(seq, previous, lost, "audio packets lost");
                }
                self.previous_seq = Some(seq);
            }
            Some(previous) => {
                tracing::warn!(seq, previous, "late audio packet");
            }
            None => self.previous_seq = Some(seq),
        }

        let data = self.codec.depacketize(packet.payload())?;
        if data.is_empty() {
            return None;
        }
        Some(AudioPacket {
            timestamp_ms: timestamp_to_ms(packet.timestamp(), self.codec.clock_rate()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_packet(seq: u16, timestamp: u32, payload: &[u8]) -> Vec<u8> {
        let mut packet = RtpPacket::new();
        packet.set_sequence_number(seq);
        packet.set_timestamp(timestamp);
        packet.set_payload_type(97);
        packet.append_payload(payload).unwrap();
        packet.into_bytes()
    }

    #[test]
    fn amr_wb_header_stripped() {
        let mut receiver = AudioReceiver::new(AudioCodecType::AmrWb);
        let packet = receiver.received(&make_packet(1, 16_000, &[0xF0, 1, 2, 3])).unwrap();
        assert_eq!(packet.data, vec![1, 2, 3]);
        assert_eq!(packet.timestamp_ms, 1000);

        assert!(receiver.received(&make_packet(2, 16_320, &[0xF0])).is_none());
    }

    #[test]
    fn g711_clock() {
        let mut receiver = AudioReceiver::new(AudioCodecType::G711);
        let packet = receiver.received(&make_packet(1, 8_160, &[0xD5; 160])).unwrap();
        assert_eq!(packet.timestamp_ms, 1020);
        assert_eq!(packet.data.len(), 160);
    }

    #[test]
    fn duplicate_dropped_late_delivered() {
        let mut receiver = AudioReceiver::new(AudioCodecType::G711);
        assert!(receiver.received(&make_packet(10, 0, &[1])).is_some());
        assert!(receiver.received(&make_packet(10, 0, &[1])).is_none());
        assert!(receiver.received(&make_packet(12, 320, &[3])).is_some());

        // late packets still play and do not move the reference back
        assert!(receiver.received(&make_packet(11, 160, &[2])).is_some());
        assert!(receiver.received(&make_packet(12, 320, &[3])).is_none());
    }

    #[test]
    fn continues_across_wrap() {
        let mut receiver = AudioReceiver::new(AudioCodecType::G711);
        for seq in [65534u16, 65535, 0, 1] {
            assert!(receiver.received(&make_packet(seq, 0, &[0xFF])).is_some());
        }
        assert!(receiver.received(&make_packet(1, 0, &[0xFF])).is_none());

        receiver.reset();
        assert!(receiver.received(&make_packet(1, 0, &[0xFF])).is_some());
    }
}
