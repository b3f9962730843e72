//! H.264 RTP depacketizer (RFC 6184).
//!
//! Turns one RTP payload back into NAL unit data:
//!
//! - **FU-A**: one entry per packet. The start fragment gets its original
//!   NAL header byte back (`F|NRI` from the FU indicator, type from the
//!   FU header); later fragments are raw continuation bytes.
//! - **STAP-A**: one entry per aggregated NAL unit.
//! - **Single NAL Unit**: the whole payload.
//!
//! Only parameter sets and slices (SPS, PPS, IDR, non-IDR) are forwarded
//! from STAP-A and Single NAL Unit payloads; other types are dropped.

use super::nal::{NAL_TYPE_MASK, NaluType};
use super::{
    F_BIT, FU_A_HEADER_SIZE, FU_START_BIT, LENGTH_FIELD_SIZE, NAL_HEADER_SIZE, NRI_MASK,
    STAP_A_HEADER_SIZE,
};

/// How a NAL unit was carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketizationType {
    SingleNalU,
    StapA,
    FuA,
}

/// One NAL unit (or FU-A fragment of one) recovered from an RTP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayload {
    pub nalu_type: NaluType,
    /// `true` when `payload` begins a NAL unit (it starts with the NAL header).
    pub is_first_packet_in_frame: bool,
    pub packetization: PacketizationType,
    pub payload: Vec<u8>,
}

/// Stateless H.264 payload parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct H264Depacketizer;

impl H264Depacketizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse one RTP payload. Malformed payloads yield no entries.
    pub fn parse(&self, payload: &[u8]) -> Vec<ParsedPayload> {
        let Some(&header) = payload.first() else {
            return Vec::new();
        };
        if header & NAL_TYPE_MASK == NaluType::FuA as u8 {
            parse_fu_a(payload).into_iter().collect()
        } else {
            parse_stap_a_or_single(payload)
        }
    }
}

fn parse_fu_a(payload: &[u8]) -> Option<ParsedPayload> {
    if payload.len() < FU_A_HEADER_SIZE {
        tracing::debug!(len = payload.len(), "FU-A payload too short");
        return None;
    }
    let fnri = payload[0] & (F_BIT | NRI_MASK);
    let nalu_type = NaluType::from_header(payload[1])?;
    let is_start = payload[1] & FU_START_BIT != 0;

    let fragment = &payload[FU_A_HEADER_SIZE..];
    let data = if is_start {
        let mut data = Vec::with_capacity(fragment.len() + NAL_HEADER_SIZE);
        data.push(fnri | nalu_type as u8);
        data.extend_from_slice(fragment);
        data
    } else {
        fragment.to_vec()
    };

    Some(ParsedPayload {
        nalu_type,
        is_first_packet_in_frame: is_start,
        packetization: PacketizationType::FuA,
        payload: data,
    })
}

fn parse_stap_a_or_single(payload: &[u8]) -> Vec<ParsedPayload> {
    let (packetization, units) = if payload[0] & NAL_TYPE_MASK == NaluType::StapA as u8 {
        if payload.len() <= STAP_A_HEADER_SIZE {
            tracing::debug!(len = payload.len(), "STAP-A payload too short");
            return Vec::new();
        }
        match stap_a_units(&payload[NAL_HEADER_SIZE..]) {
            Some(units) => (PacketizationType::StapA, units),
            None => {
                tracing::debug!(len = payload.len(), "STAP-A unit overruns payload");
                return Vec::new();
            }
        }
    } else {
        (PacketizationType::SingleNalU, vec![payload])
    };

    units
        .into_iter()
        .filter_map(|unit| {
            let header = *unit.first()?;
            match NaluType::from_header(header) {
                Some(
                    nalu_type @ (NaluType::Sps | NaluType::Pps | NaluType::Idr | NaluType::Slice),
                ) => Some(ParsedPayload {
                    nalu_type,
                    is_first_packet_in_frame: true,
                    packetization,
                    payload: unit.to_vec(),
                }),
                _ => {
                    tracing::trace!(nal_type = header & NAL_TYPE_MASK, "NAL unit not forwarded");
                    None
                }
            }
        })
        .collect()
}

/// Split the body of a STAP-A (after its header byte) into NAL units.
fn stap_a_units(mut body: &[u8]) -> Option<Vec<&[u8]>> {
    let mut units = Vec::new();
    while !body.is_empty() {
        if body.len() < LENGTH_FIELD_SIZE {
            return None;
        }
        let size = u16::from_be_bytes([body[0], body[1]]) as usize;
        body = &body[LENGTH_FIELD_SIZE..];
        if size > body.len() {
            return None;
        }
        units.push(&body[..size]);
        body = &body[size..];
    }
    Some(units)
}
