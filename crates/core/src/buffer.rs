//! Growable byte array with checked big-endian accessors.
//!
//! Every fixed-offset read or write goes through an explicit
//! `(offset, len)` check against the written length, so header
//! manipulation in [`crate::media::rtp`] can never touch bytes past the
//! end of the packet.

use std::ops::Range;

use crate::error::{Error, Result};

/// Byte storage shared by the RTP codec and packetizers.
///
/// `len()` is the number of written bytes. `put_*` only overwrites
/// existing bytes; `push_*` appends and grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Set the written length, zero-filling any new bytes.
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, 0);
    }

    fn range(&self, offset: usize, len: usize) -> Result<Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(offset..end),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            }),
        }
    }

    pub fn get(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn get_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let range = self.range(offset, len)?;
        Ok(&mut self.data[range])
    }

    pub fn get_u16(&self, offset: usize) -> Result<u16> {
        let b = self.get(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        let b = self.get(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn put_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.get_mut(offset, 1)?[0] = value;
        Ok(())
    }

    pub fn put_u16(&mut self, offset: usize, value: u16) -> Result<()> {
        self.put_slice(offset, &value.to_be_bytes())
    }

    pub fn put_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.put_slice(offset, &value.to_be_bytes())
    }

    pub fn put_slice(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.get_mut(offset, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill_zero(&mut self, offset: usize, len: usize) -> Result<()> {
        self.get_mut(offset, len)?.fill(0);
        Ok(())
    }

    /// Move `len` bytes from `src` to `dest` inside the buffer (overlap allowed).
    pub fn copy_within(&mut self, src: usize, len: usize, dest: usize) -> Result<()> {
        let from = self.range(src, len)?;
        self.range(dest, len)?;
        self.data.copy_within(from, dest);
        Ok(())
    }

    pub fn push_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn push_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<ByteBuffer> for Vec<u8> {
    fn from(buffer: ByteBuffer) -> Self {
        buffer.data
    }
}
