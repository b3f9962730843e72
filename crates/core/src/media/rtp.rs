//! RTP packet codec (RFC 3550 §5.1) with RFC 8285 header extensions.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            Contributing source (CSRC) identifiers             |
//! |                             ....                              |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |  0xBEDE / 0x1000 profile      |      length in 32-bit words   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Extension elements + padding               |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |                           Payload                             |
//! |             ....              :  padding...   | padding size  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! An [`RtpPacket`] has two lifecycles:
//!
//! - **Build**: [`RtpPacket::with_capacity`] writes the fixed header, the
//!   `set_*` methods patch header fields in place, then CSRCs, then
//!   extensions ([`allocate_extension`](RtpPacket::allocate_extension)),
//!   then payload ([`append_payload`](RtpPacket::append_payload)).
//!   Each section is locked once a later one has been written.
//! - **Parse**: [`RtpPacket::parse`] validates a wire buffer and records
//!   field values and extension locations in a single pass.

use std::fmt;

use crate::buffer::ByteBuffer;
use crate::error::{Error, ParseErrorKind, Result};

pub const FIXED_HEADER_SIZE: usize = 12;
pub const RTP_VERSION: u8 = 2;
/// Default packet capacity, a typical Ethernet MTU.
pub const DEFAULT_PACKET_SIZE: usize = 1500;

const ONE_BYTE_PROFILE: u16 = 0xBEDE;
const TWO_BYTE_PROFILE: u16 = 0x1000;
const ONE_BYTE_HEADER_LEN: usize = 1;
const TWO_BYTE_HEADER_LEN: usize = 2;
const ONE_BYTE_RESERVED_ID: u8 = 15;
const EXTENSION_BLOCK_HEADER_LEN: usize = 4;
const MAX_CSRCS: usize = 15;

/// Location of one header-extension element inside a packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub id: u8,
    /// Length of the element value in bytes.
    pub length: u8,
    /// Offset of the first value byte from the start of the packet.
    pub offset: u16,
}

/// A single RTP packet backed by one contiguous byte buffer.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    marker: bool,
    payload_type: u8,
    sequence_number: u16,
    timestamp: u32,
    ssrc: u32,
    csrc_count: usize,
    padding_size: usize,
    payload_offset: usize,
    payload_size: usize,
    extension_profile: Option<u16>,
    extension_size: usize,
    extension_entries: Vec<ExtensionEntry>,
    capacity: usize,
    header_locked: bool,
    buffer: ByteBuffer,
}

impl Default for RtpPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl RtpPacket {
    /// Empty packet with [`DEFAULT_PACKET_SIZE`] capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PACKET_SIZE)
    }

    /// Start building a packet that may grow to at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(FIXED_HEADER_SIZE);
        let mut buffer = ByteBuffer::with_capacity(capacity);
        buffer.resize(FIXED_HEADER_SIZE);
        buffer.as_mut_slice()[0] = RTP_VERSION << 6;
        Self {
            marker: false,
            payload_type: 0,
            sequence_number: 0,
            timestamp: 0,
            ssrc: 0,
            csrc_count: 0,
            padding_size: 0,
            payload_offset: FIXED_HEADER_SIZE,
            payload_size: 0,
            extension_profile: None,
            extension_size: 0,
            extension_entries: Vec::new(),
            capacity,
            header_locked: false,
            buffer,
        }
    }

    // The buffer always holds at least the fixed header in both lifecycles.
    fn header_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut_slice()[..FIXED_HEADER_SIZE]
    }

    pub fn set_marker(&mut self, marker: bool) {
        self.marker = marker;
        let header = self.header_mut();
        header[1] = (header[1] & 0x7F) | if marker { 0x80 } else { 0 };
    }

    pub fn set_payload_type(&mut self, payload_type: u8) {
        self.payload_type = payload_type & 0x7F;
        let pt = self.payload_type;
        let header = self.header_mut();
        header[1] = (header[1] & 0x80) | pt;
    }

    pub fn set_sequence_number(&mut self, sequence_number: u16) {
        self.sequence_number = sequence_number;
        self.header_mut()[2..4].copy_from_slice(&sequence_number.to_be_bytes());
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
        self.header_mut()[4..8].copy_from_slice(&timestamp.to_be_bytes());
    }

    pub fn set_ssrc(&mut self, ssrc: u32) {
        self.ssrc = ssrc;
        self.header_mut()[8..12].copy_from_slice(&ssrc.to_be_bytes());
    }

    /// Write the CSRC list. Must come before any extension or payload.
    pub fn set_csrcs(&mut self, csrcs: &[u32]) -> Result<()> {
        if self.header_locked || self.extension_profile.is_some() {
            return Err(Error::HeaderLocked);
        }
        if csrcs.len() > MAX_CSRCS {
            return Err(Error::TooManyCsrcs(csrcs.len()));
        }
        let payload_offset = FIXED_HEADER_SIZE + 4 * csrcs.len();
        if payload_offset > self.capacity {
            return Err(Error::PacketTooLarge {
                size: payload_offset,
                capacity: self.capacity,
            });
        }

        self.buffer.resize(payload_offset);
        for (i, csrc) in csrcs.iter().enumerate() {
            self.buffer.put_u32(FIXED_HEADER_SIZE + 4 * i, *csrc)?;
        }
        let count = csrcs.len() as u8;
        let header = self.header_mut();
        header[0] = (header[0] & 0xF0) | count;
        self.csrc_count = csrcs.len();
        self.payload_offset = payload_offset;
        Ok(())
    }

    /// Offset of the first extension element (just past the 4-byte block header).
    fn extensions_offset(&self) -> usize {
        FIXED_HEADER_SIZE + 4 * self.csrc_count + EXTENSION_BLOCK_HEADER_LEN
    }

    /// Reserve room for one extension element and return its value bytes.
    ///
    /// Picks the one-byte format (ids 1–14, lengths 1–16) while possible.
    /// The first element that needs the two-byte format promotes every
    /// existing one-byte element in place.
    pub fn allocate_extension(&mut self, id: u8, length: usize) -> Result<&mut [u8]> {
        if self.header_locked {
            return Err(Error::HeaderLocked);
        }
        if id == 0 || length > u8::MAX as usize {
            return Err(Error::InvalidExtension { id, length });
        }

        let extensions_offset = self.extensions_offset();
        let requires_two_byte =
            id >= ONE_BYTE_RESERVED_ID || length > 16 || length == 0;

        let profile = match self.extension_profile {
            Some(ONE_BYTE_PROFILE) if requires_two_byte => {
                let expected = self.extension_size
                    + self.extension_entries.len()
                    + TWO_BYTE_HEADER_LEN
                    + length;
                if extensions_offset + padded(expected) > self.capacity {
                    return Err(Error::ExtensionSpace);
                }
                self.promote_to_two_byte()?;
                TWO_BYTE_PROFILE
            }
            Some(profile) => profile,
            None if requires_two_byte => TWO_BYTE_PROFILE,
            None => ONE_BYTE_PROFILE,
        };

        let header_len = if profile == ONE_BYTE_PROFILE {
            ONE_BYTE_HEADER_LEN
        } else {
            TWO_BYTE_HEADER_LEN
        };
        let new_size = self.extension_size + header_len + length;
        if extensions_offset + padded(new_size) > self.capacity {
            return Err(Error::ExtensionSpace);
        }

        if self.extension_profile.is_none() {
            self.buffer.resize(extensions_offset);
            self.header_mut()[0] |= 0x10;
            self.buffer
                .put_u16(extensions_offset - EXTENSION_BLOCK_HEADER_LEN, profile)?;
            self.extension_profile = Some(profile);
        }

        let element = extensions_offset + self.extension_size;
        self.buffer.resize(extensions_offset + new_size);
        if profile == ONE_BYTE_PROFILE {
            self.buffer
                .put_u8(element, (id << 4) | (length as u8 - 1))?;
        } else {
            self.buffer.put_u8(element, id)?;
            self.buffer.put_u8(element + 1, length as u8)?;
        }

        let offset = element + header_len;
        self.extension_entries.push(ExtensionEntry {
            id,
            length: length as u8,
            offset: offset as u16,
        });
        self.extension_size = new_size;
        self.close_extension_block()?;

        tracing::trace!(
            id,
            length,
            offset,
            profile = format_args!("{:#06X}", profile),
            "extension allocated"
        );
        self.buffer.get_mut(offset, length)
    }

    /// Rewrite every one-byte element with a two-byte header.
    ///
    /// Element `i` gains one header byte and moves right by `i + 1`.
    /// Elements are moved last-first so no value is overwritten before it
    /// has been copied.
    fn promote_to_two_byte(&mut self) -> Result<()> {
        let extensions_offset = self.extensions_offset();
        let count = self.extension_entries.len();
        self.buffer
            .resize(extensions_offset + self.extension_size + count);

        for (i, entry) in self.extension_entries.iter_mut().enumerate().rev() {
            let old = entry.offset as usize;
            let new = old + i + 1;
            self.buffer.copy_within(old, entry.length as usize, new)?;
            self.buffer.put_u8(new - 2, entry.id)?;
            self.buffer.put_u8(new - 1, entry.length)?;
            entry.offset = new as u16;
        }

        self.buffer.put_u16(
            extensions_offset - EXTENSION_BLOCK_HEADER_LEN,
            TWO_BYTE_PROFILE,
        )?;
        self.extension_profile = Some(TWO_BYTE_PROFILE);
        self.extension_size += count;
        tracing::debug!(elements = count, "promoted header extensions to two-byte format");
        self.close_extension_block()
    }

    /// Write the block length in words, zero the tail padding and move the payload offset.
    fn close_extension_block(&mut self) -> Result<()> {
        let extensions_offset = self.extensions_offset();
        let padded_size = padded(self.extension_size);
        self.buffer.put_u16(
            extensions_offset - 2,
            (padded_size / 4) as u16,
        )?;
        self.buffer.resize(extensions_offset + padded_size);
        self.buffer.fill_zero(
            extensions_offset + self.extension_size,
            padded_size - self.extension_size,
        )?;
        self.payload_offset = extensions_offset + padded_size;
        Ok(())
    }

    /// Append payload bytes. Locks the CSRC list and extensions.
    pub fn append_payload(&mut self, bytes: &[u8]) -> Result<()> {
        let size = self.buffer.len() + bytes.len();
        if size > self.capacity {
            return Err(Error::PacketTooLarge {
                size,
                capacity: self.capacity,
            });
        }
        self.header_locked = true;
        self.buffer.extend_from_slice(bytes);
        self.payload_size += bytes.len();
        Ok(())
    }

    /// Parse a wire buffer.
    ///
    /// Unknown extension profiles are tolerated (no entries recorded).
    /// Element enumeration stops at the reserved one-byte id 15 or at the
    /// first element whose length overruns the block.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(Error::parse(ParseErrorKind::TooShort));
        }
        if data[0] >> 6 != RTP_VERSION {
            return Err(Error::parse(ParseErrorKind::BadVersion));
        }

        let has_padding = data[0] & 0x20 != 0;
        let has_extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0F) as usize;
        let marker = data[1] & 0x80 != 0;
        let payload_type = data[1] & 0x7F;
        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut payload_offset = FIXED_HEADER_SIZE + 4 * csrc_count;
        if data.len() < payload_offset {
            return Err(Error::parse(ParseErrorKind::CsrcOverrun));
        }

        let padding_size = if has_padding {
            match data[data.len() - 1] {
                0 => return Err(Error::parse(ParseErrorKind::ZeroPadding)),
                n => n as usize,
            }
        } else {
            0
        };

        let mut extension_profile = None;
        let mut extension_size = 0;
        let mut extension_entries = Vec::new();
        if has_extension {
            let extensions_offset = payload_offset + EXTENSION_BLOCK_HEADER_LEN;
            if extensions_offset > data.len() {
                return Err(Error::parse(ParseErrorKind::ExtensionOverrun));
            }
            let profile = u16::from_be_bytes([data[payload_offset], data[payload_offset + 1]]);
            let words = u16::from_be_bytes([data[payload_offset + 2], data[payload_offset + 3]]);
            let block_len = 4 * words as usize;
            if extensions_offset + block_len > data.len() {
                return Err(Error::parse(ParseErrorKind::ExtensionOverrun));
            }

            let block = &data[extensions_offset..extensions_offset + block_len];
            match profile {
                ONE_BYTE_PROFILE | TWO_BYTE_PROFILE => {
                    extension_entries = parse_extension_elements(block, extensions_offset, profile);
                }
                _ => {
                    tracing::debug!(
                        profile = format_args!("{:#06X}", profile),
                        "unsupported RTP header extension profile"
                    );
                }
            }
            extension_profile = Some(profile);
            extension_size = block_len;
            payload_offset = extensions_offset + block_len;
        }

        if payload_offset + padding_size > data.len() {
            return Err(Error::parse(ParseErrorKind::PaddingOverrun));
        }
        let payload_size = data.len() - payload_offset - padding_size;

        Ok(Self {
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc_count,
            padding_size,
            payload_offset,
            payload_size,
            extension_profile,
            extension_size,
            extension_entries,
            capacity: data.len(),
            header_locked: true,
            buffer: ByteBuffer::from_slice(data),
        })
    }

    pub fn marker(&self) -> bool {
        self.marker
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn csrcs(&self) -> Vec<u32> {
        (0..self.csrc_count)
            .filter_map(|i| self.buffer.get_u32(FIXED_HEADER_SIZE + 4 * i).ok())
            .collect()
    }

    pub fn padding_size(&self) -> usize {
        self.padding_size
    }

    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    pub fn payload(&self) -> &[u8] {
        self.buffer
            .get(self.payload_offset, self.payload_size)
            .unwrap_or_default()
    }

    pub fn extension_entries(&self) -> &[ExtensionEntry] {
        &self.extension_entries
    }

    /// Value bytes of an entry recorded on this packet.
    pub fn extension_value(&self, entry: &ExtensionEntry) -> Option<&[u8]> {
        self.buffer
            .get(entry.offset as usize, entry.length as usize)
            .ok()
    }

    /// Value bytes of the first element with `id`.
    pub fn find_extension(&self, id: u8) -> Option<&[u8]> {
        self.extension_entries
            .iter()
            .find(|entry| entry.id == id)
            .and_then(|entry| self.extension_value(entry))
    }

    /// Serialized packet.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn padded(size: usize) -> usize {
    size.div_ceil(4) * 4
}

fn parse_extension_elements(block: &[u8], base: usize, profile: u16) -> Vec<ExtensionEntry> {
    let header_len = if profile == ONE_BYTE_PROFILE {
        ONE_BYTE_HEADER_LEN
    } else {
        TWO_BYTE_HEADER_LEN
    };

    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos + header_len <= block.len() {
        if block[pos] == 0 {
            pos += 1;
            continue;
        }
        let (id, length) = if profile == ONE_BYTE_PROFILE {
            let id = block[pos] >> 4;
            let length = (block[pos] & 0x0F) + 1;
            if id == ONE_BYTE_RESERVED_ID || id == 0 {
                break;
            }
            (id, length)
        } else {
            (block[pos], block[pos + 1])
        };

        if pos + header_len + length as usize > block.len() {
            tracing::debug!(id, length, "header extension element overruns block");
            break;
        }
        let Ok(offset) = u16::try_from(base + pos + header_len) else {
            break;
        };
        entries.push(ExtensionEntry { id, length, offset });
        pos += header_len + length as usize;
    }
    entries
}

impl fmt::Display for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RTP pt={} marker={} seq={} ts={} ssrc={:#010X} payload={}@{}",
            self.payload_type,
            self.marker,
            self.sequence_number,
            self.timestamp,
            self.ssrc,
            self.payload_size,
            self.payload_offset
        )
    }
}
