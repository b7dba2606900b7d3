use crate::{
    cdr::{
        reader::CdrReader,
        value::{CdrCodec, ValueDecoder, ValueEncoder},
        writer::{length_prefix, CdrWriter},
    },
    error::{OrbError, OrbResult},
    xtypes::{
        data_storage::DataStorage,
        sequence_value::SequenceValue,
        type_descriptor::{PrimitiveKind, TypeDescriptor, TypeKind},
    },
};

impl CdrCodec {
    /// Writes the element count followed by the elements. A sequence longer
    /// than its bound fails with [`OrbError::BoundViolation`] and leaves the
    /// writer untouched.
    pub fn encode_sequence(&self, writer: &mut CdrWriter, value: &SequenceValue) -> OrbResult<()> {
        self.encode_with(writer, |encoder| {
            encoder.encode_sequence(
                value.storage_elements(),
                value.element_type(),
                value.max_len(),
            )
        })
    }

    pub fn decode_sequence(
        &self,
        reader: &mut CdrReader,
        element_type: &TypeDescriptor,
        max_len: Option<u32>,
    ) -> OrbResult<SequenceValue> {
        match ValueDecoder::new(self, reader).decode_sequence(element_type, max_len)? {
            DataStorage::Sequence(elements) => Ok(SequenceValue::from_parts(
                element_type.clone(),
                elements,
                max_len,
            )),
            other => Err(OrbError::TypeMismatch {
                expected: "sequence".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}

fn is_octet(element: &TypeDescriptor) -> bool {
    matches!(
        element.resolve_alias().kind(),
        TypeKind::Primitive(PrimitiveKind::Octet)
    )
}

impl ValueEncoder<'_, '_> {
    pub(crate) fn encode_sequence(
        &mut self,
        elements: &[DataStorage],
        element: &TypeDescriptor,
        bound: Option<u32>,
    ) -> OrbResult<()> {
        if let Some(bound) = bound {
            if elements.len() > bound as usize {
                return Err(OrbError::BoundViolation {
                    bound,
                    length: elements.len(),
                });
            }
        }
        self.writer.write_u32(length_prefix(elements.len())?);
        for e in elements {
            self.encode(e, element)?;
        }
        Ok(())
    }

    /// Arrays carry no count, their length is part of the type.
    pub(crate) fn encode_array(
        &mut self,
        elements: &[DataStorage],
        element: &TypeDescriptor,
        length: u32,
    ) -> OrbResult<()> {
        if elements.len() != length as usize {
            return Err(OrbError::InvalidData(format!(
                "array of length {length} holds {} elements",
                elements.len()
            )));
        }
        for e in elements {
            self.encode(e, element)?;
        }
        Ok(())
    }

    pub(crate) fn encode_octets(&mut self, octets: &[u8]) -> OrbResult<()> {
        self.writer.write_u32(length_prefix(octets.len())?);
        self.writer.write_octets(octets);
        Ok(())
    }
}

impl ValueDecoder<'_, '_, '_> {
    pub(crate) fn decode_sequence(
        &mut self,
        element: &TypeDescriptor,
        bound: Option<u32>,
    ) -> OrbResult<DataStorage> {
        let count = self.reader.read_u32()?;
        if let Some(bound) = bound {
            if count > bound {
                return Err(OrbError::BoundViolation {
                    bound,
                    length: count as usize,
                });
            }
        }
        if is_octet(element) {
            let octets = self.reader.read_exact(count as usize)?;
            return Ok(DataStorage::Sequence(
                octets.iter().copied().map(DataStorage::Octet).collect(),
            ));
        }
        // The count comes from the peer, do not trust it for the allocation
        let mut elements = Vec::with_capacity((count as usize).min(self.reader.remaining()));
        for _ in 0..count {
            elements.push(self.decode(element)?);
        }
        Ok(DataStorage::Sequence(elements))
    }

    pub(crate) fn decode_array(
        &mut self,
        element: &TypeDescriptor,
        length: u32,
    ) -> OrbResult<DataStorage> {
        let mut elements = Vec::with_capacity((length as usize).min(self.reader.remaining()));
        for _ in 0..length {
            elements.push(self.decode(element)?);
        }
        Ok(DataStorage::Array(elements))
    }

    pub(crate) fn decode_octets(&mut self) -> OrbResult<Vec<u8>> {
        let count = self.reader.read_u32()? as usize;
        Ok(self.reader.read_exact(count)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cdr::endianness::{CdrEndianness, CodecSettings, WCharWidth},
        xtypes::{
            dynamic_value::DynamicValue,
            type_support::{BoundedSequence, WString},
        },
    };

    fn codec() -> CdrCodec {
        CdrCodec::new(CodecSettings::new(
            CdrEndianness::BigEndian,
            WCharWidth::Two,
        ))
    }

    fn wstrings(max_len: Option<u32>, values: &[&str]) -> SequenceValue {
        let mut seq = SequenceValue::new(TypeDescriptor::wstring(), max_len);
        for v in values {
            seq.push(DynamicValue::from_value(WString::from(*v))).unwrap();
        }
        seq
    }

    #[test]
    fn bound_is_checked_before_any_byte() {
        let codec = codec();
        let mut writer = CdrWriter::new(codec.settings());
        assert_eq!(
            codec.encode_sequence(&mut writer, &wstrings(Some(1), &["a", "b"])),
            Err(OrbError::BoundViolation {
                bound: 1,
                length: 2
            })
        );
        assert!(writer.as_bytes().is_empty());
    }

    #[test]
    fn sequence_at_its_bound_is_accepted() {
        let codec = codec();
        let mut writer = CdrWriter::new(codec.settings());
        codec
            .encode_sequence(&mut writer, &wstrings(Some(2), &["a", "b"]))
            .unwrap();
        assert_eq!(
            writer.into_inner(),
            vec![
                0, 0, 0, 2, // count
                0, 0, 0, 1, 0, b'a', // first wstring
                0, 0, // padding
                0, 0, 0, 1, 0, b'b', // second wstring
            ]
        );
    }

    #[test]
    fn decoded_count_above_bound_is_rejected() {
        let codec = codec();
        let bytes = codec.encode(vec![1u16, 2, 3]).unwrap();
        let mut reader = CdrReader::new(&bytes, codec.settings());
        assert_eq!(
            codec.decode_sequence(&mut reader, &TypeDescriptor::ushort(), Some(2)),
            Err(OrbError::BoundViolation {
                bound: 2,
                length: 3
            })
        );
    }

    #[test]
    fn empty_sequence_round_trip() {
        let codec = codec();
        let bytes = codec.encode(Vec::<WString>::new()).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert_eq!(codec.decode::<Vec<WString>>(&bytes), Ok(vec![]));
    }

    #[test]
    fn array_has_no_count() {
        let codec = codec();
        let bytes = codec.encode([1u16, 2, 3]).unwrap();
        assert_eq!(bytes, vec![0, 1, 0, 2, 0, 3]);
        assert_eq!(codec.decode::<[u16; 3]>(&bytes), Ok([1, 2, 3]));
    }

    #[test]
    fn nested_sequences_round_trip() {
        let codec = codec();
        let value = vec![vec![1u8, 2], vec![], vec![3]];
        let bytes = codec.encode(value.clone()).unwrap();
        assert_eq!(codec.decode::<Vec<Vec<u8>>>(&bytes), Ok(value));
    }

    #[test]
    fn truncated_octet_sequence() {
        let codec = codec();
        assert!(matches!(
            codec.decode::<Vec<u8>>(&[0, 0, 0, 9, 1, 2]),
            Err(OrbError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn bounded_sequence_type_support() {
        let codec = codec();
        let bytes = codec
            .encode(BoundedSequence::<i32, 3>::new(vec![4, 5]))
            .unwrap();
        assert_eq!(
            codec.decode::<BoundedSequence<i32, 3>>(&bytes),
            Ok(BoundedSequence::new(vec![4, 5]))
        );
        assert!(matches!(
            codec.encode(BoundedSequence::<i32, 1>::new(vec![4, 5])),
            Err(OrbError::BoundViolation { .. })
        ));
    }
}
