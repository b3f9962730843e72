//! Media units exchanged with the capture, encode and playout layers.
//!
//! The core never looks inside these buffers beyond NAL unit boundaries:
//! video is Annex B, audio is whatever the codec collaborator produced.

use std::time::Duration;

/// Display rotation carried alongside video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoRotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl VideoRotation {
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }
}

/// One encoded access unit handed to a video sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedImage {
    /// Annex B bytes.
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub is_key_frame: bool,
    pub presentation_timestamp: Duration,
    pub rotation: VideoRotation,
}

impl EncodedImage {
    pub fn new(buffer: Vec<u8>, presentation_timestamp: Duration) -> Self {
        Self {
            buffer,
            presentation_timestamp,
            ..Default::default()
        }
    }
}

/// One reassembled access unit delivered to the decoder side.
///
/// An empty `data` is a placeholder emitted when a frame could not be
/// decoded (no parameter sets yet) so the consumer keeps its cadence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoPacket {
    pub timestamp_ms: u64,
    pub data: Vec<u8>,
    pub rotation: VideoRotation,
}

impl VideoPacket {
    pub fn is_placeholder(&self) -> bool {
        self.data.is_empty()
    }
}

/// One depacketized audio frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioPacket {
    pub timestamp_ms: u64,
    pub data: Vec<u8>,
}
