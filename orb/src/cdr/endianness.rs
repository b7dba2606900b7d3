use crate::error::{OrbError, OrbResult};

/// Byte order used for every multi-byte primitive of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CdrEndianness {
    BigEndian,
    #[default]
    LittleEndian,
}

impl CdrEndianness {
    /// Flag octet carried in the message preamble (CDR convention: 1 is little endian).
    pub fn flag(self) -> u8 {
        match self {
            CdrEndianness::BigEndian => 0,
            CdrEndianness::LittleEndian => 1,
        }
    }

    pub fn from_flag(flag: u8) -> OrbResult<Self> {
        match flag {
            0 => Ok(CdrEndianness::BigEndian),
            1 => Ok(CdrEndianness::LittleEndian),
            _ => Err(OrbError::EncodingMismatch(format!(
                "unknown byte order flag {flag}"
            ))),
        }
    }
}

/// Number of bytes in one wide character code unit. Negotiated once per
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WCharWidth {
    /// UTF-16 code units.
    #[default]
    Two,
    /// UTF-32 code units.
    Four,
}

impl WCharWidth {
    pub fn bytes(self) -> usize {
        match self {
            WCharWidth::Two => 2,
            WCharWidth::Four => 4,
        }
    }

    pub fn from_bytes(width: u8) -> OrbResult<Self> {
        match width {
            2 => Ok(WCharWidth::Two),
            4 => Ok(WCharWidth::Four),
            _ => Err(OrbError::EncodingMismatch(format!(
                "unsupported wide character width {width}"
            ))),
        }
    }
}

/// The encoding parameters both ends of a connection must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecSettings {
    pub endianness: CdrEndianness,
    pub wchar_width: WCharWidth,
}

impl CodecSettings {
    pub fn new(endianness: CdrEndianness, wchar_width: WCharWidth) -> Self {
        Self {
            endianness,
            wchar_width,
        }
    }

    pub fn ensure_matches(&self, peer: &CodecSettings) -> OrbResult<()> {
        if self.endianness != peer.endianness {
            return Err(OrbError::EncodingMismatch(format!(
                "byte order {:?} does not match session byte order {:?}",
                peer.endianness, self.endianness
            )));
        }
        if self.wchar_width != peer.wchar_width {
            return Err(OrbError::EncodingMismatch(format!(
                "wide character width {} does not match session width {}",
                peer.wchar_width.bytes(),
                self.wchar_width.bytes()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_mismatch_is_encoding_mismatch() {
        let session = CodecSettings::new(CdrEndianness::LittleEndian, WCharWidth::Two);
        let peer = CodecSettings::new(CdrEndianness::LittleEndian, WCharWidth::Four);
        assert!(matches!(
            session.ensure_matches(&peer),
            Err(OrbError::EncodingMismatch(_))
        ));
        assert_eq!(session.ensure_matches(&session), Ok(()));
    }

    #[test]
    fn flags_round_trip() {
        for e in [CdrEndianness::BigEndian, CdrEndianness::LittleEndian] {
            assert_eq!(CdrEndianness::from_flag(e.flag()), Ok(e));
        }
        assert!(CdrEndianness::from_flag(7).is_err());
        assert!(WCharWidth::from_bytes(3).is_err());
    }
}
