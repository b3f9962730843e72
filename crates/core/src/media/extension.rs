//! RTP header extensions understood by this crate (RFC 8285).
//!
//! The only extension defined is Coordination of Video Orientation
//! (3GPP TS 26.114 §7.4.5), a one-byte value:
//!
//! ```text
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |0 0 0 0 C F R R|
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! `R R` is the clockwise rotation in 90° steps. Camera (`C`) and flip
//! (`F`) bits are written as zero and ignored on receipt.

use std::collections::HashMap;

use crate::frame::VideoRotation;

/// Extension kinds. The discriminant is the default local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtpExtensionType {
    VideoRotation = 1,
}

impl RtpExtensionType {
    pub fn uri(self) -> &'static str {
        match self {
            Self::VideoRotation => VideoOrientation::URI,
        }
    }

    pub fn value_size(self) -> usize {
        match self {
            Self::VideoRotation => VideoOrientation::VALUE_SIZE,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            VideoOrientation::URI => Some(Self::VideoRotation),
            _ => None,
        }
    }
}

/// Coordination of Video Orientation (CVO).
#[derive(Debug, Clone, Copy)]
pub struct VideoOrientation;

impl VideoOrientation {
    pub const URI: &'static str = "urn:3gpp:video-orientation";
    pub const VALUE_SIZE: usize = 1;

    pub fn to_cvo_byte(rotation: VideoRotation) -> u8 {
        match rotation {
            VideoRotation::Deg0 => 0,
            VideoRotation::Deg90 => 1,
            VideoRotation::Deg180 => 2,
            VideoRotation::Deg270 => 3,
        }
    }

    pub fn from_cvo_byte(byte: u8) -> VideoRotation {
        match byte & 0x3 {
            1 => VideoRotation::Deg90,
            2 => VideoRotation::Deg180,
            3 => VideoRotation::Deg270,
            _ => VideoRotation::Deg0,
        }
    }

    /// Write the CVO byte into an allocated extension value.
    /// Returns `false` if `value` is empty.
    pub fn write(value: &mut [u8], rotation: VideoRotation) -> bool {
        match value.first_mut() {
            Some(byte) => {
                *byte = Self::to_cvo_byte(rotation);
                true
            }
            None => false,
        }
    }

    pub fn parse(value: &[u8]) -> Option<VideoRotation> {
        value.first().map(|byte| Self::from_cvo_byte(*byte))
    }
}

/// Negotiated mapping between local extension ids and extension kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMap {
    ids: HashMap<RtpExtensionType, u8>,
}

impl Default for ExtensionMap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.register(RtpExtensionType::VideoRotation, RtpExtensionType::VideoRotation as u8);
        map
    }
}

impl ExtensionMap {
    pub fn empty() -> Self {
        Self { ids: HashMap::new() }
    }

    /// Map `kind` to `id`, replacing an earlier id for the same kind.
    ///
    /// Fails if `id` is outside 1..=255 or already used by another kind.
    pub fn register(&mut self, kind: RtpExtensionType, id: u8) -> bool {
        if id == 0 || self.ids.iter().any(|(k, v)| *v == id && *k != kind) {
            return false;
        }
        self.ids.insert(kind, id);
        true
    }

    pub fn id(&self, kind: RtpExtensionType) -> Option<u8> {
        self.ids.get(&kind).copied()
    }

    pub fn kind(&self, id: u8) -> Option<RtpExtensionType> {
        self.ids.iter().find(|(_, v)| **v == id).map(|(k, _)| *k)
    }

    /// SDP `a=extmap` lines (RFC 8285 §8), ordered by id.
    pub fn sdp_attributes(&self) -> Vec<String> {
        let mut entries: Vec<_> = self.ids.iter().map(|(k, v)| (*v, k.uri())).collect();
        entries.sort_unstable();
        entries
            .into_iter()
            .map(|(id, uri)| format!("a=extmap:{id} {uri}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cvo_byte_roundtrip() {
        for rotation in [
            VideoRotation::Deg0,
            VideoRotation::Deg90,
            VideoRotation::Deg180,
            VideoRotation::Deg270,
        ] {
            let mut value = [0u8; 1];
            assert!(VideoOrientation::write(&mut value, rotation));
            assert_eq!(VideoOrientation::parse(&value), Some(rotation));
        }
    }

    #[test]
    fn cvo_ignores_camera_and_flip_bits() {
        assert_eq!(VideoOrientation::from_cvo_byte(0b0000_1101), VideoRotation::Deg90);
        assert_eq!(VideoOrientation::parse(&[]), None);
        assert!(!VideoOrientation::write(&mut [], VideoRotation::Deg90));
    }

    #[test]
    fn uri_lookup() {
        assert_eq!(
            RtpExtensionType::from_uri("urn:3gpp:video-orientation"),
            Some(RtpExtensionType::VideoRotation)
        );
        assert_eq!(RtpExtensionType::from_uri("urn:ietf:params:rtp-hdrext:toffset"), None);
        assert_eq!(RtpExtensionType::VideoRotation.value_size(), 1);
    }

    #[test]
    fn map_registration() {
        let mut map = ExtensionMap::default();
        assert_eq!(map.id(RtpExtensionType::VideoRotation), Some(1));
        assert_eq!(map.kind(1), Some(RtpExtensionType::VideoRotation));
        assert!(map.register(RtpExtensionType::VideoRotation, 3));
        assert_eq!(map.kind(1), None);
        assert_eq!(map.kind(3), Some(RtpExtensionType::VideoRotation));
        assert!(!map.register(RtpExtensionType::VideoRotation, 0));
        assert_eq!(
            map.sdp_attributes(),
            vec!["a=extmap:3 urn:3gpp:video-orientation".to_string()]
        );
        assert!(ExtensionMap::empty().sdp_attributes().is_empty());
    }
}
