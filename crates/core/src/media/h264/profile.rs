//! The SDP `profile-level-id` parameter (RFC 6184 §8.1).
//!
//! Three bytes, written as six hex digits: `profile_idc`, `profile-iop`
//! (the constraint_set flags) and `level_idc`. Profiles are recognized
//! by matching `profile-iop` against bit patterns per `profile_idc`.

use std::fmt;

/// SDP parameter name.
pub const PROFILE_LEVEL_ID: &str = "profile-level-id";

const CONSTRAINT_SET3_FLAG: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    ConstrainedBaseline,
    Baseline,
    Main,
    ConstrainedHigh,
    High,
}

/// `level_idc` values. Level 1b has no idc of its own and is signaled
/// as level 1.1 with constraint_set3 set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Level1b = 0,
    Level1 = 10,
    Level1_1 = 11,
    Level1_2 = 12,
    Level1_3 = 13,
    Level2 = 20,
    Level2_1 = 21,
    Level2_2 = 22,
    Level3 = 30,
    Level3_1 = 31,
    Level3_2 = 32,
    Level4 = 40,
    Level4_1 = 41,
    Level4_2 = 42,
    Level5 = 50,
    Level5_1 = 51,
    Level5_2 = 52,
}

impl Level {
    fn from_idc(idc: u8) -> Option<Self> {
        Some(match idc {
            10 => Self::Level1,
            11 => Self::Level1_1,
            12 => Self::Level1_2,
            13 => Self::Level1_3,
            20 => Self::Level2,
            21 => Self::Level2_1,
            22 => Self::Level2_2,
            30 => Self::Level3,
            31 => Self::Level3_1,
            32 => Self::Level3_2,
            40 => Self::Level4,
            41 => Self::Level4_1,
            42 => Self::Level4_2,
            50 => Self::Level5,
            51 => Self::Level5_1,
            52 => Self::Level5_2,
            _ => return None,
        })
    }
}

/// Bit pattern over one byte: `'1'`/`'0'` must match, `'x'` is ignored.
#[derive(Debug, Clone, Copy)]
struct BitPattern {
    mask: u8,
    masked_value: u8,
}

impl BitPattern {
    const fn new(pattern: &[u8; 8]) -> Self {
        let mut mask = 0u8;
        let mut masked_value = 0u8;
        let mut i = 0;
        while i < 8 {
            let bit = 1 << (7 - i);
            if pattern[i] != b'x' {
                mask |= bit;
            }
            if pattern[i] == b'1' {
                masked_value |= bit;
            }
            i += 1;
        }
        Self { mask, masked_value }
    }

    fn is_match(&self, value: u8) -> bool {
        value & self.mask == self.masked_value
    }
}

struct ProfilePattern {
    profile_idc: u8,
    profile_iop: BitPattern,
    profile: Profile,
}

impl ProfilePattern {
    const fn new(profile_idc: u8, profile_iop: &[u8; 8], profile: Profile) -> Self {
        Self {
            profile_idc,
            profile_iop: BitPattern::new(profile_iop),
            profile,
        }
    }
}

const PROFILE_PATTERNS: [ProfilePattern; 8] = [
    ProfilePattern::new(0x42, b"x1xx0000", Profile::ConstrainedBaseline),
    ProfilePattern::new(0x4D, b"1xxx0000", Profile::ConstrainedBaseline),
    ProfilePattern::new(0x58, b"11xx0000", Profile::ConstrainedBaseline),
    ProfilePattern::new(0x42, b"x0xx0000", Profile::Baseline),
    ProfilePattern::new(0x58, b"10xx0000", Profile::Baseline),
    ProfilePattern::new(0x4D, b"0x0x0000", Profile::Main),
    ProfilePattern::new(0x64, b"00000000", Profile::High),
    ProfilePattern::new(0x64, b"00001100", Profile::ConstrainedHigh),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileLevelId {
    pub profile: Profile,
    pub level: Level,
}

impl ProfileLevelId {
    pub fn new(profile: Profile, level: Level) -> Self {
        Self { profile, level }
    }

    /// Read the three profile/level bytes that follow the NAL header of an SPS.
    pub fn from_sps(sps: &[u8]) -> Option<Self> {
        match sps {
            [_, profile_idc, profile_iop, level_idc, ..] => {
                from_bytes(*profile_idc, *profile_iop, *level_idc)
            }
            _ => None,
        }
    }
}

/// Parse a six-hex-digit `profile-level-id` value.
pub fn parse_profile_level_id(value: &str) -> Option<ProfileLevelId> {
    if value.len() != 6 {
        return None;
    }
    let numeric = u32::from_str_radix(value, 16).ok()?;
    from_bytes((numeric >> 16) as u8, (numeric >> 8) as u8, numeric as u8)
}

fn from_bytes(profile_idc: u8, profile_iop: u8, level_idc: u8) -> Option<ProfileLevelId> {
    let mut level = Level::from_idc(level_idc)?;
    if level == Level::Level1_1 && profile_iop & CONSTRAINT_SET3_FLAG != 0 {
        level = Level::Level1b;
    }
    let pattern = PROFILE_PATTERNS
        .iter()
        .find(|p| p.profile_idc == profile_idc && p.profile_iop.is_match(profile_iop))?;
    Some(ProfileLevelId::new(pattern.profile, level))
}

impl fmt::Display for ProfileLevelId {
    /// Canonical lower-case hex form. Level 1b exists only for the
    /// baseline and main profiles; other profiles with level 1b write nothing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.level == Level::Level1b {
            return match self.profile {
                Profile::ConstrainedBaseline => f.write_str("42f00b"),
                Profile::Baseline => f.write_str("42100b"),
                Profile::Main => f.write_str("4d100b"),
                _ => Ok(()),
            };
        }
        let idc_iop = match self.profile {
            Profile::ConstrainedBaseline => "42e0",
            Profile::Baseline => "4200",
            Profile::Main => "4d00",
            Profile::ConstrainedHigh => "640c",
            Profile::High => "6400",
        };
        write!(f, "{}{:02x}", idc_iop, self.level as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_profiles() {
        assert_eq!(
            parse_profile_level_id("42e01f"),
            Some(ProfileLevelId::new(Profile::ConstrainedBaseline, Level::Level3_1))
        );
        assert_eq!(
            parse_profile_level_id("42001f"),
            Some(ProfileLevelId::new(Profile::Baseline, Level::Level3_1))
        );
        assert_eq!(
            parse_profile_level_id("4d0032"),
            Some(ProfileLevelId::new(Profile::Main, Level::Level5))
        );
        assert_eq!(
            parse_profile_level_id("640c2a"),
            Some(ProfileLevelId::new(Profile::ConstrainedHigh, Level::Level4_2))
        );
        assert_eq!(
            parse_profile_level_id("64001F"),
            Some(ProfileLevelId::new(Profile::High, Level::Level3_1))
        );
    }

    #[test]
    fn level_1b_from_constraint_set3() {
        assert_eq!(
            parse_profile_level_id("42f00b"),
            Some(ProfileLevelId::new(Profile::ConstrainedBaseline, Level::Level1b))
        );
        assert_eq!(
            parse_profile_level_id("42e00b").map(|p| p.level),
            Some(Level::Level1_1)
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert_eq!(parse_profile_level_id(""), None);
        assert_eq!(parse_profile_level_id("42e01"), None);
        assert_eq!(parse_profile_level_id("zzzzzz"), None);
        assert_eq!(parse_profile_level_id("42e0ff"), None); // unknown level
        assert_eq!(parse_profile_level_id("e2e01f"), None); // unknown profile_idc
        assert_eq!(parse_profile_level_id("42e81f"), None); // reserved bits set
    }

    #[test]
    fn display_is_canonical() {
        for s in ["42e01f", "42001f", "4d0032", "640c2a", "64001f", "42f00b", "42100b", "4d100b"] {
            let parsed = parse_profile_level_id(s).unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert_eq!(ProfileLevelId::new(Profile::High, Level::Level1b).to_string(), "");
    }

    #[test]
    fn from_sps_bytes() {
        let sps = [0x67, 0x42, 0xE0, 0x1F, 0xDA];
        assert_eq!(
            ProfileLevelId::from_sps(&sps),
            Some(ProfileLevelId::new(Profile::ConstrainedBaseline, Level::Level3_1))
        );
        assert_eq!(ProfileLevelId::from_sps(&[0x67, 0x42]), None);
    }
}
