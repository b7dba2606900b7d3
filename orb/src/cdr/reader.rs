use crate::{
    cdr::endianness::{CdrEndianness, CodecSettings, WCharWidth},
    error::{OrbError, OrbResult},
};

/// Primitive CDR decoder over a borrowed message. Padding bytes are skipped
/// without looking at their content.
pub struct CdrReader<'a> {
    buffer: &'a [u8],
    pos: usize,
    settings: CodecSettings,
}

impl<'a> CdrReader<'a> {
    pub fn new(buffer: &'a [u8], settings: CodecSettings) -> Self {
        Self {
            buffer,
            pos: 0,
            settings,
        }
    }

    pub fn settings(&self) -> CodecSettings {
        self.settings
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves to an absolute offset of the message, e.g. the start of a body
    /// whose header was decoded earlier.
    pub fn seek_to(&mut self, position: usize) -> OrbResult<()> {
        if position > self.buffer.len() {
            return Err(OrbError::UnexpectedEnd {
                needed: position - self.pos,
                remaining: self.remaining(),
            });
        }
        self.pos = position;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }

    pub fn read_exact(&mut self, length: usize) -> OrbResult<&'a [u8]> {
        if length > self.remaining() {
            return Err(OrbError::UnexpectedEnd {
                needed: length,
                remaining: self.remaining(),
            });
        }
        let ret = &self.buffer[self.pos..self.pos + length];
        self.pos += length;
        Ok(ret)
    }

    fn read_array<const N: usize>(&mut self) -> OrbResult<[u8; N]> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.read_exact(N)?);
        Ok(bytes)
    }

    fn read_padding(&mut self, alignment: usize) -> OrbResult<()> {
        let mask = alignment - 1;
        let padding = ((self.pos + mask) & !mask) - self.pos;
        self.read_exact(padding).map(|_| ())
    }

    pub fn read_octet(&mut self) -> OrbResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> OrbResult<bool> {
        match self.read_octet()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(OrbError::InvalidData(format!(
                "invalid bool encoding. Value {v}"
            ))),
        }
    }

    pub fn read_i16(&mut self) -> OrbResult<i16> {
        self.read_padding(2)?;
        let bytes = self.read_array()?;
        Ok(match self.settings.endianness {
            CdrEndianness::BigEndian => i16::from_be_bytes(bytes),
            CdrEndianness::LittleEndian => i16::from_le_bytes(bytes),
        })
    }

    pub fn read_u16(&mut self) -> OrbResult<u16> {
        self.read_padding(2)?;
        let bytes = self.read_array()?;
        Ok(match self.settings.endianness {
            CdrEndianness::BigEndian => u16::from_be_bytes(bytes),
            CdrEndianness::LittleEndian => u16::from_le_bytes(bytes),
        })
    }

    pub fn read_i32(&mut self) -> OrbResult<i32> {
        self.read_padding(4)?;
        let bytes = self.read_array()?;
        Ok(match self.settings.endianness {
            CdrEndianness::BigEndian => i32::from_be_bytes(bytes),
            CdrEndianness::LittleEndian => i32::from_le_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self) -> OrbResult<u32> {
        self.read_padding(4)?;
        let bytes = self.read_array()?;
        Ok(match self.settings.endianness {
            CdrEndianness::BigEndian => u32::from_be_bytes(bytes),
            CdrEndianness::LittleEndian => u32::from_le_bytes(bytes),
        })
    }

    pub fn read_i64(&mut self) -> OrbResult<i64> {
        self.read_padding(8)?;
        let bytes = self.read_array()?;
        Ok(match self.settings.endianness {
            CdrEndianness::BigEndian => i64::from_be_bytes(bytes),
            CdrEndianness::LittleEndian => i64::from_le_bytes(bytes),
        })
    }

    pub fn read_u64(&mut self) -> OrbResult<u64> {
        self.read_padding(8)?;
        let bytes = self.read_array()?;
        Ok(match self.settings.endianness {
            CdrEndianness::BigEndian => u64::from_be_bytes(bytes),
            CdrEndianness::LittleEndian => u64::from_le_bytes(bytes),
        })
    }

    pub fn read_f32(&mut self) -> OrbResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> OrbResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_char(&mut self) -> OrbResult<char> {
        Ok(char::from(self.read_octet()?))
    }

    pub fn read_wchar(&mut self) -> OrbResult<char> {
        let code = match self.settings.wchar_width {
            WCharWidth::Two => self.read_u16()? as u32,
            WCharWidth::Four => self.read_u32()?,
        };
        char::from_u32(code).ok_or_else(|| {
            OrbError::InvalidData(format!("invalid wide character code unit {code:#x}"))
        })
    }

    pub fn read_string(&mut self) -> OrbResult<String> {
        let length = self.read_u32()? as usize;
        if length == 0 {
            // Not legal CDR but produced by some peers for the empty string
            return Ok(String::new());
        }
        let octets = self.read_exact(length)?;
        let (terminator, text) = octets.split_last().ok_or_else(|| {
            OrbError::InvalidData("string without terminator".to_string())
        })?;
        if *terminator != 0 {
            return Err(OrbError::InvalidData(format!(
                "string terminator is {terminator:#x} instead of 0"
            )));
        }
        Ok(text.iter().copied().map(char::from).collect())
    }

    pub fn read_wstring(&mut self) -> OrbResult<String> {
        let length = self.read_u32()? as usize;
        // Reject absurd lengths before allocating for them
        let needed = length.saturating_mul(self.settings.wchar_width.bytes());
        if needed > self.remaining() {
            return Err(OrbError::UnexpectedEnd {
                needed,
                remaining: self.remaining(),
            });
        }
        match self.settings.wchar_width {
            WCharWidth::Two => {
                let mut units = Vec::with_capacity(length);
                for _ in 0..length {
                    units.push(self.read_u16()?);
                }
                String::from_utf16(&units)
                    .map_err(|e| OrbError::InvalidData(format!("invalid UTF-16 wstring: {e}")))
            }
            WCharWidth::Four => {
                let mut s = String::with_capacity(length);
                for _ in 0..length {
                    let code = self.read_u32()?;
                    s.push(char::from_u32(code).ok_or_else(|| {
                        OrbError::InvalidData(format!("invalid UTF-32 code unit {code:#x}"))
                    })?);
                }
                Ok(s)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8], endianness: CdrEndianness) -> CdrReader<'_> {
        CdrReader::new(bytes, CodecSettings::new(endianness, WCharWidth::Two))
    }

    #[test]
    fn read_long_both_orders() {
        assert_eq!(
            reader(&[0, 0, 0, 7], CdrEndianness::BigEndian).read_i32(),
            Ok(7)
        );
        assert_eq!(
            reader(&[7, 0, 0, 0], CdrEndianness::LittleEndian).read_i32(),
            Ok(7)
        );
    }

    #[test]
    fn padding_content_is_ignored() {
        let bytes = [1, 0xaa, 0xbb, 0xcc, 0, 0, 0, 2];
        let mut r = reader(&bytes, CdrEndianness::BigEndian);
        assert_eq!(r.read_octet(), Ok(1));
        assert_eq!(r.read_u32(), Ok(2));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_input_is_unexpected_end() {
        let mut r = reader(&[1, 2], CdrEndianness::BigEndian);
        assert_eq!(
            r.read_u32(),
            Err(OrbError::UnexpectedEnd {
                needed: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn invalid_bool() {
        assert!(matches!(
            reader(&[2], CdrEndianness::BigEndian).read_bool(),
            Err(OrbError::InvalidData(_))
        ));
    }

    #[test]
    fn read_string_requires_terminator() {
        let good = [3, 0, 0, 0, b'h', b'i', 0];
        assert_eq!(
            reader(&good, CdrEndianness::LittleEndian).read_string(),
            Ok("hi".to_string())
        );
        let bad = [3, 0, 0, 0, b'h', b'i', b'!'];
        assert!(matches!(
            reader(&bad, CdrEndianness::LittleEndian).read_string(),
            Err(OrbError::InvalidData(_))
        ));
    }

    #[test]
    fn read_zero_length_string_as_empty() {
        assert_eq!(
            reader(&[0, 0, 0, 0], CdrEndianness::LittleEndian).read_string(),
            Ok(String::new())
        );
    }

    #[test]
    fn read_wstring_width_two() {
        let bytes = [0, 0, 0, 2, 0, b'a', 0, 0xf1];
        assert_eq!(
            reader(&bytes, CdrEndianness::BigEndian).read_wstring(),
            Ok("añ".to_string())
        );
    }

    #[test]
    fn wstring_length_beyond_input_fails_early() {
        let bytes = [0xff, 0xff, 0xff, 0x0f, 0, 1];
        assert!(matches!(
            reader(&bytes, CdrEndianness::LittleEndian).read_wstring(),
            Err(OrbError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn seek_to_respects_absolute_alignment() {
        let bytes = [9, 9, 9, 9, 9, 0, 0, 0, 5, 0, 0, 0];
        let mut r = reader(&bytes, CdrEndianness::LittleEndian);
        r.seek_to(5).unwrap();
        assert_eq!(r.read_u32(), Ok(5));
    }
}
