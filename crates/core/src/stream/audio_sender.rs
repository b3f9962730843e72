use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::media::Packetizer;
use crate::media::audio::{AudioCodecType, AudioEncoder, AudioPacketizer};
use crate::media::rtp::{DEFAULT_PACKET_SIZE, RtpPacket};
use crate::ring::RingBuffer;
use crate::ssrc::SsrcRegistry;

/// Audio sender parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSenderConfig {
    pub codec: AudioCodecType,
    pub payload_type: u8,
    pub packet_capacity: usize,
    /// Initial PCM ring size in bytes. The ring grows on demand.
    pub ring_capacity: usize,
}

impl AudioSenderConfig {
    /// Defaults for `codec`, with its conventional payload type.
    pub fn new(codec: AudioCodecType) -> Self {
        Self {
            codec,
            payload_type: codec.default_payload_type(),
            packet_capacity: DEFAULT_PACKET_SIZE,
            ring_capacity: 3048,
        }
    }
}

impl Default for AudioSenderConfig {
    fn default() -> Self {
        Self::new(AudioCodecType::AmrWb)
    }
}

/// Sends one audio stream as RTP, one 20 ms frame per packet.
///
/// The capture side writes raw PCM into [`input`](Self::input) from its
/// own thread; the sending task calls [`drain`](Self::drain) to encode and
/// packetize every complete frame buffered so far.
pub struct AudioSender {
    config: AudioSenderConfig,
    encoder: Box<dyn AudioEncoder>,
    ring: Arc<RingBuffer>,
    registry: SsrcRegistry,
    ssrc: u32,
    sequence_number: u16,
    timestamp: u32,
}

impl AudioSender {
    pub fn new(
        config: AudioSenderConfig,
        encoder: Box<dyn AudioEncoder>,
        registry: &SsrcRegistry,
    ) -> Result<Self> {
        if encoder.codec_type() != config.codec {
            return Err(Error::Codec(format!(
                "encoder produces {:?}, stream expects {:?}",
                encoder.codec_type(),
                config.codec
            )));
        }
        let ssrc = registry.generate()?;
        tracing::info!(
            ssrc = format_args!("{:#010X}", ssrc),
            codec = ?config.codec,
            payload_type = config.payload_type,
            "audio sender created"
        );
        Ok(Self {
            ring: Arc::new(RingBuffer::new(config.ring_capacity)),
            config,
            encoder,
            registry: registry.clone(),
            ssrc,
            sequence_number: 0,
            timestamp: 0,
        })
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    /// RTP timestamp the next frame will carry.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn config(&self) -> &AudioSenderConfig {
        &self.config
    }

    /// Shared PCM input for the capture thread.
    pub fn input(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.ring)
    }

    pub fn write_pcm(&self, pcm: &[u8]) {
        self.ring.write(pcm);
    }

    /// Discard buffered PCM.
    pub fn reset(&self) {
        self.ring.reset();
    }

    /// Encode and packetize every whole frame in the ring.
    ///
    /// A frame the encoder rejects is skipped; its time slot is still
    /// consumed so the receiver's clock stays aligned.
    pub fn drain(&mut self) -> Result<Vec<Vec<u8>>> {
        let codec = self.config.codec;
        let frame_bytes = codec.frame_bytes();
        let mut packets = Vec::new();

        while self.ring.len() >= frame_bytes {
            let Some(pcm) = self.ring.read(frame_bytes) else {
                break;
            };
            let timestamp = self.timestamp;
            self.timestamp = self.timestamp.wrapping_add(codec.samples_per_frame());

            let encoded = match self.encoder.encode(&pcm) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::warn!(error = %e, timestamp, "audio frame skipped");
                    continue;
                }
            };

            let mut packet = RtpPacket::with_capacity(self.config.packet_capacity);
            packet.set_ssrc(self.ssrc);
            packet.set_payload_type(self.config.payload_type);
            packet.set_sequence_number(self.sequence_number);
            packet.set_timestamp(timestamp);

            let mut packetizer = AudioPacketizer::new(codec, &encoded);
            if !packetizer.next_packet(&mut packet)? {
                tracing::debug!(timestamp, "encoder produced an empty frame");
                continue;
            }
            tracing::trace!(
                seq = self.sequence_number,
                timestamp,
                size = packet.len(),
                "audio packet built"
            );
            self.sequence_number = self.sequence_number.wrapping_add(1);
            packets.push(packet.into_bytes());
        }
        Ok(packets)
    }
}

impl fmt::Debug for AudioSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSender")
            .field("config", &self.config)
            .field("ssrc", &format_args!("{:#010X}", self.ssrc))
            .field("sequence_number", &self.sequence_number)
            .field("timestamp", &self.timestamp)
            .field("buffered", &self.ring.len())
            .finish()
    }
}

impl Drop for AudioSender {
    fn drop(&mut self) {
        self.registry.release(self.ssrc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::g711::{G711Codec, G711Law};

    /// Echoes PCM back, or fails on demand.
    struct PassthroughEncoder {
        codec: AudioCodecType,
        fail_next: bool,
    }

    impl AudioEncoder for PassthroughEncoder {
        fn codec_type(&self) -> AudioCodecType {
            self.codec
        }

        fn encode(&mut self, pcm: &[u8]) -> Result<Vec<u8>> {
            if std::mem::take(&mut self.fail_next) {
                return Err(Error::Codec("rejected".into()));
            }
            Ok(pcm[..4].to_vec())
        }
    }

    fn make_sender(codec: AudioCodecType, registry: &SsrcRegistry) -> AudioSender {
        let encoder = PassthroughEncoder {
            codec,
            fail_next: false,
        };
        AudioSender::new(AudioSenderConfig::new(codec), Box::new(encoder), registry).unwrap()
    }

    #[test]
    fn amr_wb_frames() {
        let registry = SsrcRegistry::new();
        let mut sender = make_sender(AudioCodecType::AmrWb, &registry);
        sender.write_pcm(&[7u8; 640 * 2 + 100]);

        let packets = sender.drain().unwrap();
        assert_eq!(packets.len(), 2);
        for (i, bytes) in packets.iter().enumerate() {
            let packet = RtpPacket::parse(bytes).unwrap();
            assert_eq!(packet.payload_type(), 97);
            assert_eq!(packet.sequence_number(), i as u16);
            assert_eq!(packet.timestamp(), i as u32 * 320);
            assert_eq!(packet.ssrc(), sender.ssrc());
            assert_eq!(packet.payload(), &[0xF0, 7, 7, 7, 7]);
        }
        assert_eq!(sender.input().len(), 100);
        assert!(sender.drain().unwrap().is_empty());

        sender.write_pcm(&[7u8; 540]);
        assert_eq!(sender.drain().unwrap().len(), 1);
        assert_eq!(sender.timestamp(), 960);
    }

    #[test]
    fn exact_frame_is_drained() {
        let registry = SsrcRegistry::new();
        let mut sender = make_sender(AudioCodecType::G711, &registry);
        sender.input().write(&[0u8; 320]);
        assert_eq!(sender.drain().unwrap().len(), 1);
    }

    #[test]
    fn encoder_failure_keeps_clock() {
        let registry = SsrcRegistry::new();
        let encoder = PassthroughEncoder {
            codec: AudioCodecType::G711,
            fail_next: true,
        };
        let config = AudioSenderConfig::new(AudioCodecType::G711);
        let mut sender = AudioSender::new(config, Box::new(encoder), &registry).unwrap();
        sender.write_pcm(&[1u8; 640]);

        let packets = sender.drain().unwrap();
        assert_eq!(packets.len(), 1);
        let packet = RtpPacket::parse(&packets[0]).unwrap();
        assert_eq!(packet.sequence_number(), 0);
        assert_eq!(packet.timestamp(), 160);
    }

    #[test]
    fn g711_encoder() {
        let registry = SsrcRegistry::new();
        let mut config = AudioSenderConfig::new(AudioCodecType::G711);
        config.payload_type = G711Law::ALaw.payload_type();
        let encoder = G711Codec::new(G711Law::ALaw);
        let mut sender = AudioSender::new(config, Box::new(encoder), &registry).unwrap();
        sender.write_pcm(&[0u8; 320]);

        let packets = sender.drain().unwrap();
        let packet = RtpPacket::parse(&packets[0]).unwrap();
        assert_eq!(packet.payload_type(), 8);
        assert_eq!(packet.payload(), &[0xD5; 160][..]);
    }

    #[test]
    fn codec_mismatch_is_rejected() {
        let registry = SsrcRegistry::new();
        let result = AudioSender::new(
            AudioSenderConfig::new(AudioCodecType::AmrWb),
            Box::new(G711Codec::default()),
            &registry,
        );
        assert!(matches!(result, Err(Error::Codec(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn reset_and_release() {
        let registry = SsrcRegistry::new();
        let mut sender = make_sender(AudioCodecType::AmrWb, &registry);
        sender.write_pcm(&[0u8; 1000]);
        sender.reset();
        assert!(sender.drain().unwrap().is_empty());

        let ssrc = sender.ssrc();
        drop(sender);
        assert!(!registry.contains(ssrc));
    }
}
