//! Per-stream RTP pipelines.
//!
//! Each type here owns the state of exactly one direction of one stream
//! (sequence counters, SSRC, parameter-set cache, reorder window) and is
//! driven by a single task:
//!
//! ```text
//! send:    EncodedImage ─► H264VideoSender ─► RTP bytes
//!          PCM ─► RingBuffer ─► AudioSender ─► RTP bytes
//! receive: RTP bytes ─► H264FrameAssembler ─► VideoPacket
//!          RTP bytes ─► AudioReceiver ─► AudioPacket
//! ```
//!
//! Sequence numbers are compared modulo 2^16 throughout (RFC 3550 §A.1).

mod audio_receiver;
mod audio_sender;
mod video_receiver;
mod video_sender;

pub use audio_receiver::AudioReceiver;
pub use audio_sender::{AudioSender, AudioSenderConfig};
pub use video_receiver::{H264FrameAssembler, VideoReceiverConfig};
pub use video_sender::{H264VideoSender, VideoPackets, VideoSenderConfig};

/// Half the sequence number space.
const SEQ_HALF_RANGE: u16 = 0x8000;

/// Whether `a` comes after `b`, allowing for wraparound.
pub fn seq_is_newer(a: u16, b: u16) -> bool {
    a != b && a.wrapping_sub(b) < SEQ_HALF_RANGE
}

/// Shortest distance between two sequence numbers on the 16-bit circle.
pub fn seq_distance(a: u16, b: u16) -> u16 {
    let forward = a.wrapping_sub(b);
    forward.min(b.wrapping_sub(a))
}

/// Convert an RTP timestamp to milliseconds at `clock_rate`.
pub(crate) fn timestamp_to_ms(timestamp: u32, clock_rate: u32) -> u64 {
    u64::from(timestamp) * 1000 / u64::from(clock_rate)
}
