//! H.264 and audio RTP media core.
//!
//! Turns encoded access units and PCM into RTP packets and back:
//!
//! - [`media`]: the RTP packet codec, H.264 (RFC 6184) packetizer and
//!   depacketizer, AMR-WB and G.711 payload framing.
//! - [`stream`]: per-stream senders and receivers that own sequence
//!   numbers, timestamps, SSRCs and the reorder window.
//! - [`ring`], [`ssrc`]: state shared between capture, encode and
//!   network threads.
//! - [`transport`]: UDP sockets for the packets.
//!
//! Everything except [`transport`] is pure computation over in-memory
//! buffers and never blocks.

pub mod buffer;
pub mod error;
pub mod frame;
pub mod media;
pub mod ring;
pub mod ssrc;
pub mod stream;
pub mod transport;

pub use error::{Error, ParseErrorKind, Result};
pub use frame::{AudioPacket, EncodedImage, VideoPacket, VideoRotation};
pub use media::rtp::RtpPacket;
pub use media::{Packetizer, PayloadSizeLimits};
pub use ring::RingBuffer;
pub use ssrc::SsrcRegistry;
pub use stream::{
    AudioReceiver, AudioSender, AudioSenderConfig, H264FrameAssembler, H264VideoSender,
    VideoReceiverConfig, VideoSenderConfig,
};
pub use transport::UdpTransport;
