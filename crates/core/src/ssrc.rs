//! Allocation of RTP synchronization source identifiers (RFC 3550 §8.1).
//!
//! A [`SsrcRegistry`] is owned by whatever layer owns the transport
//! session and handed to each sender. Senders draw an SSRC when they are
//! created and release it when they are dropped, so two live senders on
//! the same registry never share an identifier.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

const MAX_ATTEMPTS: usize = 64;

/// Thread-safe set of SSRCs currently in use.
///
/// Cloning yields another handle to the same set.
#[derive(Debug, Clone, Default)]
pub struct SsrcRegistry {
    allocated: Arc<Mutex<HashSet<u32>>>,
}

impl SsrcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a random SSRC that no other holder of this registry is using.
    ///
    /// Zero is never handed out.
    pub fn generate(&self) -> Result<u32> {
        let mut allocated = self.allocated.lock();
        for _ in 0..MAX_ATTEMPTS {
            let ssrc = rand::random::<u32>();
            if ssrc != 0 && allocated.insert(ssrc) {
                tracing::debug!(
                    ssrc = format_args!("{:#010X}", ssrc),
                    active = allocated.len(),
                    "SSRC allocated"
                );
                return Ok(ssrc);
            }
        }
        Err(Error::SsrcExhausted)
    }

    /// Return an SSRC to the pool. Returns `false` if it was not allocated.
    pub fn release(&self, ssrc: u32) -> bool {
        let mut allocated = self.allocated.lock();
        let removed = allocated.remove(&ssrc);
        if removed {
            tracing::debug!(
                ssrc = format_args!("{:#010X}", ssrc),
                active = allocated.len(),
                "SSRC released"
            );
        }
        removed
    }

    pub fn contains(&self, ssrc: u32) -> bool {
        self.allocated.lock().contains(&ssrc)
    }

    /// Number of SSRCs currently allocated.
    pub fn len(&self) -> usize {
        self.allocated.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocated.lock().is_empty()
    }
}
