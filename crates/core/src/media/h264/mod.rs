//! H.264 over RTP (RFC 6184).
//!
//! - [`nal`]: Annex B start-code scanning and NAL unit types.
//! - [`packetizer`]: access unit → Single NAL Unit / STAP-A / FU-A payloads.
//! - [`depacketizer`]: RTP payload → NAL units.
//! - [`profile`]: the SDP `profile-level-id` parameter.

pub mod depacketizer;
pub mod nal;
pub mod packetizer;
pub mod profile;

pub use depacketizer::{H264Depacketizer, PacketizationType, ParsedPayload};
pub use nal::{AnnexBReader, NaluIndex, NaluType, find_nalu_indices};
pub use packetizer::{H264Packetizer, PacketizationMode};
pub use profile::{Level, Profile, ProfileLevelId, parse_profile_level_id};

/// RTP clock rate for video (RFC 6184 §8.2.1).
pub const CLOCK_RATE: u32 = 90_000;

/// Forbidden-zero bit of a NAL header.
pub(crate) const F_BIT: u8 = 0x80;
/// `nal_ref_idc` bits of a NAL header.
pub(crate) const NRI_MASK: u8 = 0x60;
/// FU header start bit.
pub(crate) const FU_START_BIT: u8 = 0x80;
/// FU header end bit.
pub(crate) const FU_END_BIT: u8 = 0x40;

pub(crate) const NAL_HEADER_SIZE: usize = 1;
pub(crate) const FU_A_HEADER_SIZE: usize = 2;
pub(crate) const LENGTH_FIELD_SIZE: usize = 2;
pub(crate) const STAP_A_HEADER_SIZE: usize = NAL_HEADER_SIZE + LENGTH_FIELD_SIZE;

/// Annex B start code inserted in front of reassembled NAL units.
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];
