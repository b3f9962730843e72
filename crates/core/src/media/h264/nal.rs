//! Annex B NAL unit indexing (ITU-T H.264 Annex B).
//!
//! H.264 Annex B bitstreams delimit NAL units with start codes:
//! - 4-byte: `0x00 0x00 0x00 0x01`
//! - 3-byte: `0x00 0x00 0x01`
//!
//! [`find_nalu_indices`] makes one forward pass over the buffer and
//! records, for each unit, where its start code begins, where its
//! payload (the NAL header byte onwards) begins, and how long the payload
//! is. The buffer itself is never copied.

/// Mask of the 5-bit `nal_unit_type` field in a NAL header byte.
pub const NAL_TYPE_MASK: u8 = 0x1F;

const SHORT_START_CODE_LEN: usize = 3;

/// H.264 NAL unit types this crate cares about (RFC 6184 §5.2, Table 7-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NaluType {
    Slice = 1,
    Idr = 5,
    Sei = 6,
    Sps = 7,
    Pps = 8,
    Aud = 9,
    EndOfSequence = 10,
    EndOfStream = 11,
    Filler = 12,
    StapA = 24,
    FuA = 28,
}

impl NaluType {
    /// Map the type field of a NAL header byte. Unlisted types yield `None`.
    pub fn from_header(byte: u8) -> Option<Self> {
        Some(match byte & NAL_TYPE_MASK {
            1 => Self::Slice,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::Filler,
            24 => Self::StapA,
            28 => Self::FuA,
            _ => return None,
        })
    }

    /// Whether this type carries coded picture data.
    pub fn is_vcl(self) -> bool {
        matches!(self, Self::Slice | Self::Idr)
    }
}

/// Location of one NAL unit inside an Annex B buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaluIndex {
    /// Offset of the first start-code byte.
    pub start_offset: usize,
    /// Offset of the NAL header byte.
    pub payload_offset: usize,
    /// Bytes from `payload_offset` up to the next start code or end of buffer.
    pub payload_size: usize,
}

impl NaluIndex {
    /// The NAL unit bytes (header included) inside `buffer`.
    pub fn payload<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.payload_offset..self.payload_offset + self.payload_size]
    }
}

/// Index every NAL unit in an Annex B buffer.
///
/// Scans for `00 00 01`, backing the start offset up by one when the
/// preceding byte is also zero so both start-code lengths are handled.
/// Each discovery closes out the previous unit's size.
pub fn find_nalu_indices(buffer: &[u8]) -> Vec<NaluIndex> {
    let mut indices: Vec<NaluIndex> = Vec::new();
    if buffer.len() < SHORT_START_CODE_LEN {
        return indices;
    }

    let end = buffer.len() - SHORT_START_CODE_LEN;
    let mut i = 0usize;
    while i < end {
        if buffer[i + 2] > 1 {
            i += 3;
        } else if buffer[i + 2] == 1 {
            if buffer[i + 1] == 0 && buffer[i] == 0 {
                let mut start_offset = i;
                if start_offset > 0 && buffer[start_offset - 1] == 0 {
                    start_offset -= 1;
                }
                if let Some(last) = indices.last_mut() {
                    last.payload_size = start_offset - last.payload_offset;
                }
                indices.push(NaluIndex {
                    start_offset,
                    payload_offset: i + SHORT_START_CODE_LEN,
                    payload_size: 0,
                });
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    if let Some(last) = indices.last_mut() {
        last.payload_size = buffer.len() - last.payload_offset;
    }
    indices
}

/// Sequential reader over the NAL units of one Annex B buffer.
#[derive(Debug, Clone)]
pub struct AnnexBReader<'a> {
    data: &'a [u8],
    indices: Vec<NaluIndex>,
    index: usize,
}

impl<'a> AnnexBReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            indices: find_nalu_indices(data),
            index: 0,
        }
    }

    pub fn indices(&self) -> &[NaluIndex] {
        &self.indices
    }

    /// Rewind to the first NAL unit.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Next NAL unit (header byte included), or `None` at the end.
    pub fn read_nal_unit(&mut self) -> Option<&'a [u8]> {
        let nalu = self.indices.get(self.index)?;
        self.index += 1;
        Some(nalu.payload(self.data))
    }

    /// Bytes from the start code of the next unit to the end of the buffer.
    pub fn remaining_bytes(&self) -> usize {
        self.indices
            .get(self.index)
            .map_or(0, |nalu| self.data.len() - nalu.start_offset)
    }

    /// Position the reader on the next unit of type `nalu_type`.
    ///
    /// Returns `false` (and leaves the position unchanged) if none follows.
    pub fn seek_to_type(&mut self, nalu_type: NaluType) -> bool {
        let found = self.indices[self.index..].iter().position(|nalu| {
            nalu.payload_size > 0
                && NaluType::from_header(self.data[nalu.payload_offset]) == Some(nalu_type)
        });
        match found {
            Some(pos) => {
                self.index += pos;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annexb(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(nal);
        }
        out
    }

    #[test]
    fn single_nal_4byte_sc() {
        let data = [0, 0, 0, 1, 0x65, 0xAA, 0xBB];
        let idx = find_nalu_indices(&data);
        assert_eq!(
            idx,
            vec![NaluIndex {
                start_offset: 0,
                payload_offset: 4,
                payload_size: 3
            }]
        );
    }

    #[test]
    fn single_nal_3byte_sc() {
        let data = [0, 0, 1, 0x67, 0x42, 0x00];
        let idx = find_nalu_indices(&data);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx[0].start_offset, 0);
        assert_eq!(idx[0].payload(&data), &[0x67, 0x42, 0x00]);
    }

    #[test]
    fn mixed_start_codes() {
        let mut data = vec![0, 0, 0, 1, 0x67, 0x42];
        data.extend_from_slice(&[0, 0, 1, 0x68, 0xCE]);
        let idx = find_nalu_indices(&data);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx[0].payload(&data), &[0x67, 0x42]);
        assert_eq!(idx[1].start_offset, 6);
        assert_eq!(idx[1].payload(&data), &[0x68, 0xCE]);
    }

    #[test]
    fn no_start_code_or_short_buffer() {
        assert!(find_nalu_indices(&[]).is_empty());
        assert!(find_nalu_indices(&[0, 0]).is_empty());
        assert!(find_nalu_indices(&[0xFF, 0xFE, 0x01, 0x02]).is_empty());
    }

    #[test]
    fn payload_containing_one_bytes() {
        let nal = [0x41, 0x01, 0x01, 0x00, 0x01, 0x02, 0x00, 0x00, 0x03, 0x01];
        let data = annexb(&[&nal]);
        let idx = find_nalu_indices(&data);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx[0].payload(&data), &nal);
    }

    #[test]
    fn reassembly_reproduces_buffer() {
        let nals: Vec<Vec<u8>> = (0..12u8)
            .map(|n| {
                let mut nal = vec![0x61 | (n % 3)];
                nal.extend((0..(n as usize * 37 + 1)).map(|i| (i % 251) as u8 | 0x02));
                nal
            })
            .collect();
        let refs: Vec<&[u8]> = nals.iter().map(|n| n.as_slice()).collect();
        let data = annexb(&refs);

        let idx = find_nalu_indices(&data);
        assert_eq!(idx.len(), nals.len());
        let rebuilt = annexb(&idx.iter().map(|n| n.payload(&data)).collect::<Vec<_>>());
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn nalu_type_mapping() {
        assert_eq!(NaluType::from_header(0x67), Some(NaluType::Sps));
        assert_eq!(NaluType::from_header(0x68), Some(NaluType::Pps));
        assert_eq!(NaluType::from_header(0x65), Some(NaluType::Idr));
        assert_eq!(NaluType::from_header(0x41), Some(NaluType::Slice));
        assert_eq!(NaluType::from_header(0x7C), Some(NaluType::FuA));
        assert_eq!(NaluType::from_header(0x78), Some(NaluType::StapA));
        assert_eq!(NaluType::from_header(0x02), None);
        assert!(NaluType::Idr.is_vcl());
        assert!(!NaluType::Sps.is_vcl());
    }

    #[test]
    fn reader_walks_and_seeks() {
        let data = annexb(&[&[0x67, 1, 2], &[0x68, 3], &[0x65, 4, 5, 6]]);
        let mut reader = AnnexBReader::new(&data);
        assert_eq!(reader.remaining_bytes(), data.len());
        assert_eq!(reader.read_nal_unit(), Some(&[0x67, 1, 2][..]));
        assert_eq!(reader.remaining_bytes(), data.len() - 7);

        assert!(reader.seek_to_type(NaluType::Idr));
        assert_eq!(reader.read_nal_unit(), Some(&[0x65, 4, 5, 6][..]));
        assert_eq!(reader.read_nal_unit(), None);
        assert_eq!(reader.remaining_bytes(), 0);
        assert!(!reader.seek_to_type(NaluType::Sps));

        reader.reset();
        assert!(reader.seek_to_type(NaluType::Pps));
        assert_eq!(reader.read_nal_unit(), Some(&[0x68, 3][..]));
    }
}
