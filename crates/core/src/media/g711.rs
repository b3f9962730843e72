//! G.711 A-law and µ-law sample codec (ITU-T G.711).
//!
//! Each 16-bit PCM sample maps to one 8-bit code word. Input and output
//! PCM is little-endian, the byte order capture devices deliver.

use super::audio::{AudioCodecType, AudioDecoder, AudioEncoder};
use crate::error::{Error, Result};

const SIGN_BIT: u8 = 0x80;
const QUANT_MASK: u8 = 0x0F;
const SEG_SHIFT: u8 = 4;
const SEG_MASK: u8 = 0x70;

const BIAS: i16 = 0x84;
const CLIP: i16 = 8159;

const SEG_AEND: [i16; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];
const SEG_UEND: [i16; 8] = [0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF, 0x1FFF];

fn segment(value: i16, table: &[i16; 8]) -> u8 {
    table.iter().position(|end| value <= *end).unwrap_or(table.len()) as u8
}

/// Encode one sample as A-law.
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut pcm = sample >> 3;
    let mask = if pcm >= 0 {
        0xD5
    } else {
        pcm = -pcm - 1;
        0x55
    };

    let seg = segment(pcm, &SEG_AEND);
    if seg >= 8 {
        return 0x7F ^ mask;
    }
    let shift = if seg < 2 { 1 } else { seg };
    let aval = (seg << SEG_SHIFT) | ((pcm >> shift) as u8 & QUANT_MASK);
    aval ^ mask
}

/// Decode one A-law code word.
pub fn alaw_to_linear(code: u8) -> i16 {
    let code = code ^ 0x55;
    let mut t = ((code & QUANT_MASK) as i16) << 4;
    let seg = (code & SEG_MASK) >> SEG_SHIFT;
    match seg {
        0 => t += 8,
        1 => t += 0x108,
        _ => {
            t += 0x108;
            t <<= seg - 1;
        }
    }
    if code & SIGN_BIT != 0 { t } else { -t }
}

/// Encode one sample as µ-law.
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut pcm = sample >> 2;
    let mask = if pcm < 0 {
        pcm = -pcm;
        0x7F
    } else {
        0xFF
    };
    pcm = pcm.min(CLIP) + (BIAS >> 2);

    let seg = segment(pcm, &SEG_UEND);
    if seg >= 8 {
        return 0x7F ^ mask;
    }
    let uval = (seg << 4) | ((pcm >> (seg + 1)) as u8 & QUANT_MASK);
    uval ^ mask
}

/// Decode one µ-law code word.
pub fn ulaw_to_linear(code: u8) -> i16 {
    let code = !code;
    let mut t = (((code & QUANT_MASK) as i16) << 3) + BIAS;
    t <<= (code & SEG_MASK) >> SEG_SHIFT;
    if code & SIGN_BIT != 0 { BIAS - t } else { t - BIAS }
}

/// Companding law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum G711Law {
    /// PCMA, static payload type 8.
    ALaw,
    /// PCMU, static payload type 0.
    #[default]
    MuLaw,
}

impl G711Law {
    pub fn payload_type(self) -> u8 {
        match self {
            Self::ALaw => 8,
            Self::MuLaw => 0,
        }
    }
}

/// Stateless G.711 encoder and decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct G711Codec {
    law: G711Law,
}

impl G711Codec {
    pub fn new(law: G711Law) -> Self {
        Self { law }
    }

    pub fn law(&self) -> G711Law {
        self.law
    }
}

impl AudioEncoder for G711Codec {
    fn codec_type(&self) -> AudioCodecType {
        AudioCodecType::G711
    }

    fn encode(&mut self, pcm: &[u8]) -> Result<Vec<u8>> {
        if pcm.len() % 2 != 0 {
            return Err(Error::Codec(format!("odd PCM length {}", pcm.len())));
        }
        let encode = match self.law {
            G711Law::ALaw => linear_to_alaw,
            G711Law::MuLaw => linear_to_ulaw,
        };
        Ok(pcm
            .chunks_exact(2)
            .map(|s| encode(i16::from_le_bytes([s[0], s[1]])))
            .collect())
    }
}

impl AudioDecoder for G711Codec {
    fn codec_type(&self) -> AudioCodecType {
        AudioCodecType::G711
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let decode = match self.law {
            G711Law::ALaw => alaw_to_linear,
            G711Law::MuLaw => ulaw_to_linear,
        };
        Ok(payload
            .iter()
            .flat_map(|code| decode(*code).to_le_bytes())
            .collect())
    }
}
