//! Media payload formats and RTP packetization.
//!
//! This module provides the [`Packetizer`] trait and the payload formats
//! that fill [`rtp::RtpPacket`]s from encoded media.
//!
//! ## RTP overview (RFC 3550)
//!
//! Each encoded video frame is split into one or more RTP packets.
//! Every RTP packet carries a 12-byte fixed header containing:
//!
//! - **Sequence number** (16-bit, wrapping) for reordering and loss detection.
//! - **Timestamp** (32-bit) in the media clock, 90 kHz for video.
//! - **SSRC** (32-bit) randomly chosen to identify the sender.
//! - **Marker bit** set on the last packet of an access unit (frame).
//!
//! ## Supported payload formats
//!
//! | Format | Module | RFC |
//! |--------|--------|-----|
//! | H.264 | [`h264`] | [RFC 6184](https://tools.ietf.org/html/rfc6184) |
//! | AMR-WB | [`audio`] | [RFC 4867](https://tools.ietf.org/html/rfc4867) |
//! | G.711 | [`audio`], [`g711`] | [RFC 3551](https://tools.ietf.org/html/rfc3551) |

pub mod audio;
pub mod extension;
pub mod g711;
pub mod h264;
pub mod rtp;

use crate::error::Result;
use rtp::RtpPacket;

/// Source of RTP payloads for one unit of media (an access unit or audio frame).
///
/// The caller owns header fields (sequence number, timestamp, SSRC,
/// extensions) and hands a freshly built packet to
/// [`next_packet`](Self::next_packet), which appends the payload and
/// may set the marker bit.
pub trait Packetizer {
    /// Write the next payload into `packet`.
    ///
    /// Returns `Ok(false)` once every payload has been produced.
    fn next_packet(&mut self, packet: &mut RtpPacket) -> Result<bool>;

    /// Number of packets still to be produced.
    fn num_packets(&self) -> usize;
}

/// Per-packet payload budget.
///
/// The reductions reserve room in specific packets for data the caller
/// adds outside the packetizer (e.g. header extensions only carried on
/// the first or last packet of a frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSizeLimits {
    /// Largest payload any single packet may carry.
    pub max_payload_len: usize,
    /// Bytes reserved in the first packet of a multi-packet unit.
    pub first_packet_reduction_len: usize,
    /// Bytes reserved in the last packet of a multi-packet unit.
    pub last_packet_reduction_len: usize,
    /// Bytes reserved when the whole unit goes in one packet.
    pub single_packet_reduction_len: usize,
}

impl Default for PayloadSizeLimits {
    fn default() -> Self {
        Self {
            max_payload_len: 1200,
            first_packet_reduction_len: 0,
            last_packet_reduction_len: 0,
            single_packet_reduction_len: 0,
        }
    }
}

/// Split `payload_len` bytes over as few packets as the limits allow,
/// keeping packet sizes as even as possible.
///
/// The first and last packet shares account for their reduction budgets.
/// Always yields at least two sizes, since it is only called for data
/// that did not fit in one packet. Returns an empty list when the limits
/// leave no room for at least one byte per packet.
pub fn separate_equally(payload_len: usize, limits: &PayloadSizeLimits) -> Vec<usize> {
    let max = limits.max_payload_len;
    if max <= limits.first_packet_reduction_len || max <= limits.last_packet_reduction_len {
        return Vec::new();
    }

    let total = payload_len + limits.first_packet_reduction_len + limits.last_packet_reduction_len;
    let num_packets = total.div_ceil(max).max(2);
    if payload_len < num_packets {
        return Vec::new();
    }

    let bytes_per_packet = total / num_packets;
    let num_larger_packets = total % num_packets;

    let mut sizes = Vec::with_capacity(num_packets);
    let mut remaining = payload_len;
    let mut packets_left = num_packets;
    while remaining > 0 {
        if packets_left == 0 {
            return Vec::new();
        }
        let mut size = bytes_per_packet;
        if sizes.len() < num_larger_packets {
            size += 1;
        }
        if sizes.is_empty() {
            size = if size > limits.first_packet_reduction_len + 1 {
                size - limits.first_packet_reduction_len
            } else {
                1
            };
        }
        size = size.min(remaining);
        // keep at least one byte for the final packet
        if packets_left == 2 && size == remaining && size > 1 {
            size -= 1;
        }
        sizes.push(size);
        remaining -= size;
        packets_left -= 1;
    }
    sizes
}
