use crate::{
    cdr::endianness::{CdrEndianness, CodecSettings, WCharWidth},
    error::{OrbError, OrbResult},
};

/// Primitive CDR encoder. Every primitive is aligned to its own size relative
/// to the start of the message the writer was created for.
pub struct CdrWriter {
    buffer: Vec<u8>,
    settings: CodecSettings,
}

impl CdrWriter {
    pub fn new(settings: CodecSettings) -> Self {
        Self {
            buffer: Vec::new(),
            settings,
        }
    }

    pub fn settings(&self) -> CodecSettings {
        self.settings
    }

    /// Offset of the next byte relative to the start of the message.
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Discards everything written after `position`. Used to undo a value
    /// that failed halfway so no partial encoding is left behind.
    pub fn truncate(&mut self, position: usize) {
        self.buffer.truncate(position);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn write_padding(&mut self, alignment: usize) {
        // Alignments are powers of two so bit-masking replaces the modulo
        const PADDING: [u8; 8] = [0; 8];
        let rem_mask = alignment - 1;
        match self.buffer.len() & rem_mask {
            0 => (),
            n => self.buffer.extend_from_slice(&PADDING[..alignment - n]),
        }
    }

    pub fn write_octet(&mut self, v: u8) {
        self.buffer.push(v);
    }

    pub fn write_octets(&mut self, v: &[u8]) {
        self.buffer.extend_from_slice(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buffer.push(v as u8);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_padding(2);
        match self.settings.endianness {
            CdrEndianness::BigEndian => self.buffer.extend_from_slice(&v.to_be_bytes()),
            CdrEndianness::LittleEndian => self.buffer.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_padding(2);
        match self.settings.endianness {
            CdrEndianness::BigEndian => self.buffer.extend_from_slice(&v.to_be_bytes()),
            CdrEndianness::LittleEndian => self.buffer.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_padding(4);
        match self.settings.endianness {
            CdrEndianness::BigEndian => self.buffer.extend_from_slice(&v.to_be_bytes()),
            CdrEndianness::LittleEndian => self.buffer.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_padding(4);
        match self.settings.endianness {
            CdrEndianness::BigEndian => self.buffer.extend_from_slice(&v.to_be_bytes()),
            CdrEndianness::LittleEndian => self.buffer.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_padding(8);
        match self.settings.endianness {
            CdrEndianness::BigEndian => self.buffer.extend_from_slice(&v.to_be_bytes()),
            CdrEndianness::LittleEndian => self.buffer.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_padding(8);
        match self.settings.endianness {
            CdrEndianness::BigEndian => self.buffer.extend_from_slice(&v.to_be_bytes()),
            CdrEndianness::LittleEndian => self.buffer.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    /// Narrow characters are single Latin-1 octets.
    pub fn write_char(&mut self, v: char) -> OrbResult<()> {
        self.buffer.push(latin1_octet(v)?);
        Ok(())
    }

    pub fn write_wchar(&mut self, v: char) -> OrbResult<()> {
        match self.settings.wchar_width {
            WCharWidth::Two => {
                let mut units = [0u16; 2];
                match *v.encode_utf16(&mut units) {
                    [unit] => self.write_u16(unit),
                    _ => {
                        return Err(OrbError::InvalidData(format!(
                            "wide character {v:?} does not fit a single 2-byte code unit"
                        )))
                    }
                }
            }
            WCharWidth::Four => self.write_u32(v as u32),
        }
        Ok(())
    }

    /// Length (including the terminating zero) followed by the Latin-1
    /// octets and the terminator.
    pub fn write_string(&mut self, v: &str) -> OrbResult<()> {
        let octets = v.chars().map(latin1_octet).collect::<OrbResult<Vec<u8>>>()?;
        let length = octets.len() + 1;
        if length > u32::MAX as usize {
            return Err(OrbError::InvalidData(format!(
                "string too long. String size {}, maximum {}",
                length,
                u32::MAX
            )));
        }
        self.write_u32(length as u32);
        self.buffer.extend_from_slice(&octets);
        self.buffer.push(0);
        Ok(())
    }

    /// Number of code units followed by the code units. No terminator.
    pub fn write_wstring(&mut self, v: &str) -> OrbResult<()> {
        match self.settings.wchar_width {
            WCharWidth::Two => {
                let units: Vec<u16> = v.encode_utf16().collect();
                self.write_u32(length_prefix(units.len())?);
                for unit in units {
                    self.write_u16(unit);
                }
            }
            WCharWidth::Four => {
                self.write_u32(length_prefix(v.chars().count())?);
                for c in v.chars() {
                    self.write_u32(c as u32);
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn length_prefix(length: usize) -> OrbResult<u32> {
    u32::try_from(length).map_err(|_| {
        OrbError::InvalidData(format!(
            "length {length} does not fit the 4-byte length prefix"
        ))
    })
}

fn latin1_octet(c: char) -> OrbResult<u8> {
    u8::try_from(c as u32).map_err(|_| {
        OrbError::InvalidData(format!("character {c:?} is not representable in Latin-1"))
    })
}
