//! H.264 RTP packetizer (RFC 6184).
//!
//! One [`H264Packetizer`] is built per access unit. Construction indexes
//! the Annex B buffer and plans every packet up front; [`next_packet`]
//! then drains the plan FIFO into caller-supplied [`RtpPacket`]s.
//!
//! Three payload structures are produced:
//!
//! - **Single NAL Unit** (§5.6): the NAL unit as-is.
//! - **STAP-A** (§5.7.1): several small NAL units in one packet, each
//!   prefixed with a 16-bit size.
//!
//!   ```text
//!   [F|NRI|Type=24] [size][NAL 1] [size][NAL 2] ...
//!   ```
//!
//! - **FU-A** (§5.8): one large NAL unit split across packets.
//!
//!   ```text
//!   FU indicator:  [F|NRI|Type=28]     (1 byte)
//!   FU header:     [S|E|R|NAL_Type]    (1 byte)
//!   Fragment data: [...]
//!   ```
//!
//! The RTP marker bit is set on the last packet of the access unit.
//!
//! [`next_packet`]: crate::media::Packetizer::next_packet

use std::collections::VecDeque;

use super::nal::{NAL_TYPE_MASK, NaluType, find_nalu_indices};
use super::{
    F_BIT, FU_A_HEADER_SIZE, FU_END_BIT, FU_START_BIT, LENGTH_FIELD_SIZE, NAL_HEADER_SIZE, NRI_MASK,
};
use crate::error::{Error, Result};
use crate::media::rtp::RtpPacket;
use crate::media::{Packetizer, PayloadSizeLimits, separate_equally};

/// RFC 6184 §6 packetization modes supported by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketizationMode {
    /// `packetization-mode=1`: Single NAL Unit, STAP-A and FU-A.
    #[default]
    NonInterleaved,
    /// `packetization-mode=0`: every NAL unit must fit in one packet.
    SingleNalUnit,
}

impl PacketizationMode {
    /// Value of the SDP `packetization-mode` parameter.
    pub fn sdp_value(self) -> u8 {
        match self {
            Self::SingleNalUnit => 0,
            Self::NonInterleaved => 1,
        }
    }
}

/// One planned piece of work: a whole NAL unit, one FU-A fragment,
/// or one member of a STAP-A aggregate.
#[derive(Debug, Clone, Copy)]
struct PacketUnit<'a> {
    fragment: &'a [u8],
    is_first: bool,
    is_last: bool,
    is_aggregated: bool,
    header: u8,
}

/// Splits one Annex B access unit into RTP payloads.
#[derive(Debug)]
pub struct H264Packetizer<'a> {
    limits: PayloadSizeLimits,
    input_fragments: Vec<&'a [u8]>,
    packets: VecDeque<PacketUnit<'a>>,
    num_packets_left: usize,
}

impl<'a> H264Packetizer<'a> {
    /// Plan the packets for `access_unit`.
    ///
    /// Fails when some NAL unit cannot be carried within `limits` in the
    /// given `mode`. No packets are produced for the access unit then.
    pub fn new(
        access_unit: &'a [u8],
        limits: PayloadSizeLimits,
        mode: PacketizationMode,
    ) -> Result<Self> {
        let input_fragments = find_nalu_indices(access_unit)
            .iter()
            .map(|nalu| nalu.payload(access_unit))
            .filter(|fragment| !fragment.is_empty())
            .collect();

        let mut packetizer = Self {
            limits,
            input_fragments,
            packets: VecDeque::new(),
            num_packets_left: 0,
        };
        if let Err(e) = packetizer.generate_packets(mode) {
            tracing::warn!(error = %e, size = access_unit.len(), "access unit dropped");
            return Err(e);
        }
        packetizer.input_fragments.clear();

        tracing::trace!(
            nal_units = planned_nal_units(&packetizer.packets),
            packets = packetizer.num_packets_left,
            "access unit packetized"
        );
        Ok(packetizer)
    }

    fn generate_packets(&mut self, mode: PacketizationMode) -> Result<()> {
        let mut i = 0;
        while i < self.input_fragments.len() {
            match mode {
                PacketizationMode::SingleNalUnit => {
                    self.packetize_single_nalu(i)?;
                    i += 1;
                }
                PacketizationMode::NonInterleaved => {
                    if self.input_fragments[i].len() > self.single_packet_capacity(i) {
                        self.packetize_fu_a(i)?;
                        i += 1;
                    } else {
                        i = self.packetize_stap_a(i)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Payload room for fragment `index` if it travels in a packet of its own.
    fn single_packet_capacity(&self, index: usize) -> usize {
        let count = self.input_fragments.len();
        let reduction = if count == 1 {
            self.limits.single_packet_reduction_len
        } else if index == 0 {
            self.limits.first_packet_reduction_len
        } else if index == count - 1 {
            self.limits.last_packet_reduction_len
        } else {
            0
        };
        self.limits.max_payload_len.saturating_sub(reduction)
    }

    fn packetize_fu_a(&mut self, index: usize) -> Result<()> {
        let fragment = self.input_fragments[index];
        let count = self.input_fragments.len();

        let mut limits = self.limits;
        limits.max_payload_len = limits.max_payload_len.saturating_sub(FU_A_HEADER_SIZE);
        if count != 1 {
            limits.single_packet_reduction_len = if index == count - 1 {
                limits.last_packet_reduction_len
            } else if index == 0 {
                limits.first_packet_reduction_len
            } else {
                0
            };
        }
        if index != 0 {
            limits.first_packet_reduction_len = 0;
        }
        if index != count - 1 {
            limits.last_packet_reduction_len = 0;
        }

        let sizes = separate_equally(fragment.len() - NAL_HEADER_SIZE, &limits);
        if sizes.is_empty() {
            return Err(Error::Packetization(format!(
                "NAL unit of {} bytes cannot be fragmented into {} byte payloads",
                fragment.len(),
                self.limits.max_payload_len
            )));
        }

        let mut offset = NAL_HEADER_SIZE;
        for (i, size) in sizes.iter().enumerate() {
            self.packets.push_back(PacketUnit {
                fragment: &fragment[offset..offset + size],
                is_first: i == 0,
                is_last: i == sizes.len() - 1,
                is_aggregated: false,
                header: fragment[0],
            });
            offset += size;
        }
        self.num_packets_left += sizes.len();

        tracing::trace!(
            nal_type = fragment[0] & NAL_TYPE_MASK,
            nal_size = fragment.len(),
            fragments = sizes.len(),
            "FU-A fragmented NAL unit"
        );
        Ok(())
    }

    /// Aggregate as many consecutive fragments as fit, starting at `index`.
    /// Returns the index of the first fragment not consumed.
    fn packetize_stap_a(&mut self, index: usize) -> Result<usize> {
        let count = self.input_fragments.len();
        let has_first_fragment = index == 0;
        let mut payload_size_left = self.limits.max_payload_len;
        let mut fragment_headers_len = 0;
        let mut aggregated = 0;
        let mut fragment_index = index;

        while fragment_index < count {
            let fragment = self.input_fragments[fragment_index];
            let has_last_fragment = fragment_index == count - 1;
            let reduction = match (has_first_fragment, has_last_fragment) {
                (true, true) => self.limits.single_packet_reduction_len,
                (true, false) => self.limits.first_packet_reduction_len,
                (false, true) => self.limits.last_packet_reduction_len,
                (false, false) => 0,
            };
            let needed = fragment.len() + fragment_headers_len;
            if payload_size_left < needed + reduction {
                break;
            }

            self.packets.push_back(PacketUnit {
                fragment,
                is_first: aggregated == 0,
                is_last: false,
                is_aggregated: true,
                header: fragment[0],
            });
            payload_size_left -= needed;
            fragment_headers_len = LENGTH_FIELD_SIZE;
            if aggregated == 0 {
                // the STAP-A header and the first size field
                fragment_headers_len += NAL_HEADER_SIZE + LENGTH_FIELD_SIZE;
            }
            aggregated += 1;
            fragment_index += 1;
        }

        if aggregated == 0 {
            return Err(Error::Packetization(format!(
                "NAL unit of {} bytes does not fit a {} byte payload",
                self.input_fragments[index].len(),
                self.limits.max_payload_len
            )));
        }
        if let Some(last) = self.packets.back_mut() {
            last.is_last = true;
        }
        self.num_packets_left += 1;
        Ok(fragment_index)
    }

    fn packetize_single_nalu(&mut self, index: usize) -> Result<()> {
        let fragment = self.input_fragments[index];
        let capacity = self.single_packet_capacity(index);
        if fragment.len() > capacity {
            return Err(Error::Packetization(format!(
                "NAL unit of {} bytes exceeds single NAL unit payload of {} bytes",
                fragment.len(),
                capacity
            )));
        }
        self.packets.push_back(PacketUnit {
            fragment,
            is_first: true,
            is_last: true,
            is_aggregated: false,
            header: fragment[0],
        });
        self.num_packets_left += 1;
        Ok(())
    }

    fn next_aggregate_packet(
        &mut self,
        first: PacketUnit<'a>,
        packet: &mut RtpPacket,
    ) -> Result<()> {
        let mut fragments = vec![first.fragment];
        let mut is_last = first.is_last;
        while !is_last {
            let Some(unit) = self.packets.pop_front() else {
                break;
            };
            is_last = unit.is_last;
            fragments.push(unit.fragment);
        }

        // F is the OR of all F bits, NRI the maximum of all NRIs (§5.7)
        let f = fragments.iter().fold(0, |acc, f| acc | (f[0] & F_BIT));
        let nri = fragments.iter().map(|f| f[0] & NRI_MASK).max().unwrap_or(0);
        packet.append_payload(&[f | nri | NaluType::StapA as u8])?;
        for fragment in &fragments {
            packet.append_payload(&(fragment.len() as u16).to_be_bytes())?;
            packet.append_payload(fragment)?;
        }
        Ok(())
    }

    fn next_fragment_packet(unit: PacketUnit<'a>, packet: &mut RtpPacket) -> Result<()> {
        let fu_indicator = (unit.header & (F_BIT | NRI_MASK)) | NaluType::FuA as u8;
        let mut fu_header = unit.header & NAL_TYPE_MASK;
        if unit.is_first {
            fu_header |= FU_START_BIT;
        }
        if unit.is_last {
            fu_header |= FU_END_BIT;
        }
        packet.append_payload(&[fu_indicator, fu_header])?;
        packet.append_payload(unit.fragment)
    }
}

fn planned_nal_units(packets: &VecDeque<PacketUnit<'_>>) -> usize {
    packets.iter().filter(|unit| unit.is_first || unit.is_aggregated).count()
}

impl Packetizer for H264Packetizer<'_> {
    fn next_packet(&mut self, packet: &mut RtpPacket) -> Result<bool> {
        let Some(unit) = self.packets.pop_front() else {
            return Ok(false);
        };

        if unit.is_first && unit.is_last {
            packet.append_payload(unit.fragment)?;
        } else if unit.is_aggregated {
            self.next_aggregate_packet(unit, packet)?;
        } else {
            Self::next_fragment_packet(unit, packet)?;
        }
        self.num_packets_left = self.num_packets_left.saturating_sub(1);
        packet.set_marker(self.packets.is_empty());
        Ok(true)
    }

    fn num_packets(&self) -> usize {
        self.num_packets_left
    }
}
