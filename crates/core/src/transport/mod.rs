//! Network transport for RTP media.
//!
//! The packetization core never touches sockets; this layer carries the
//! serialized packets it produces. [`UdpTransport`] is a thin wrapper over
//! a bound UDP socket, one per direction of a stream.

pub mod udp;

pub use udp::UdpTransport;
