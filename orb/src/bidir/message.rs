use crate::{
    cdr::{
        endianness::{CdrEndianness, CodecSettings, WCharWidth},
        reader::CdrReader,
        value::CdrCodec,
        writer::{length_prefix, CdrWriter},
    },
    error::{OrbError, OrbResult},
    reference::ObjectId,
    xtypes::{dynamic_value::DynamicValue, type_descriptor::TypeDescriptor},
};

/// Every message starts with `[byte order flag, wchar width, message type, 0]`.
pub const MESSAGE_PREAMBLE_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Reply,
    CloseConnection,
}

impl MessageType {
    fn id(self) -> u8 {
        match self {
            MessageType::Request => 0,
            MessageType::Reply => 1,
            MessageType::CloseConnection => 5,
        }
    }

    fn from_id(id: u8) -> OrbResult<Self> {
        match id {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Reply),
            5 => Ok(MessageType::CloseConnection),
            _ => Err(OrbError::InvalidData(format!("unknown message type {id}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    NoException,
    UserException,
    SystemException,
}

impl ReplyStatus {
    fn id(self) -> u32 {
        match self {
            ReplyStatus::NoException => 0,
            ReplyStatus::UserException => 1,
            ReplyStatus::SystemException => 2,
        }
    }

    fn from_id(id: u32) -> OrbResult<Self> {
        match id {
            0 => Ok(ReplyStatus::NoException),
            1 => Ok(ReplyStatus::UserException),
            2 => Ok(ReplyStatus::SystemException),
            _ => Err(OrbError::InvalidData(format!("unknown reply status {id}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub request_id: u32,
    pub response_expected: bool,
    pub object_id: ObjectId,
    pub operation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub request_id: u32,
    pub reply_status: ReplyStatus,
}

/// The values following a header. Kept as the whole message so alignment
/// stays relative to the message start when the values are decoded later,
/// once their types are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    message: Vec<u8>,
    offset: usize,
}

impl MessageBody {
    /// Decodes one value per entry of `types`, in order.
    pub fn decode(
        &self,
        codec: &CdrCodec,
        types: &[TypeDescriptor],
    ) -> OrbResult<Vec<DynamicValue>> {
        let mut reader = CdrReader::new(&self.message, codec.settings());
        reader.seek_to(self.offset)?;
        types
            .iter()
            .map(|t| codec.decode_value(&mut reader, t))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.offset == self.message.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request {
        header: RequestHeader,
        body: MessageBody,
    },
    Reply {
        header: ReplyHeader,
        body: MessageBody,
    },
    CloseConnection,
}

impl Message {
    /// Parses the preamble and header of a received message. A preamble
    /// that disagrees with `session` is [`OrbError::EncodingMismatch`].
    pub fn parse(message: Vec<u8>, session: CodecSettings) -> OrbResult<Self> {
        let preamble = message.get(..MESSAGE_PREAMBLE_LENGTH).ok_or(OrbError::UnexpectedEnd {
            needed: MESSAGE_PREAMBLE_LENGTH,
            remaining: message.len(),
        })?;
        let peer = CodecSettings::new(
            CdrEndianness::from_flag(preamble[0])?,
            WCharWidth::from_bytes(preamble[1])?,
        );
        session.ensure_matches(&peer)?;
        let message_type = MessageType::from_id(preamble[2])?;

        let mut reader = CdrReader::new(&message, session);
        reader.seek_to(MESSAGE_PREAMBLE_LENGTH)?;
        match message_type {
            MessageType::Request => {
                let request_id = reader.read_u32()?;
                let response_expected = reader.read_bool()?;
                let object_id_length = reader.read_u32()? as usize;
                let object_id = ObjectId::new(reader.read_exact(object_id_length)?.to_vec());
                let operation = reader.read_string()?;
                let offset = reader.position();
                Ok(Message::Request {
                    header: RequestHeader {
                        request_id,
                        response_expected,
                        object_id,
                        operation,
                    },
                    body: MessageBody { message, offset },
                })
            }
            MessageType::Reply => {
                let request_id = reader.read_u32()?;
                let reply_status = ReplyStatus::from_id(reader.read_u32()?)?;
                let offset = reader.position();
                Ok(Message::Reply {
                    header: ReplyHeader {
                        request_id,
                        reply_status,
                    },
                    body: MessageBody { message, offset },
                })
            }
            MessageType::CloseConnection => Ok(Message::CloseConnection),
        }
    }
}

fn write_preamble(writer: &mut CdrWriter, message_type: MessageType) {
    let settings = writer.settings();
    writer.write_octet(settings.endianness.flag());
    writer.write_octet(settings.wchar_width.bytes() as u8);
    writer.write_octet(message_type.id());
    writer.write_octet(0);
}

fn write_values(codec: &CdrCodec, writer: &mut CdrWriter, values: &[DynamicValue]) -> OrbResult<()> {
    for value in values {
        codec.encode_value(writer, value)?;
    }
    Ok(())
}

pub fn encode_request(
    codec: &CdrCodec,
    header: &RequestHeader,
    arguments: &[DynamicValue],
) -> OrbResult<Vec<u8>> {
    let mut writer = CdrWriter::new(codec.settings());
    write_preamble(&mut writer, MessageType::Request);
    writer.write_u32(header.request_id);
    writer.write_bool(header.response_expected);
    writer.write_u32(length_prefix(header.object_id.as_bytes().len())?);
    writer.write_octets(header.object_id.as_bytes());
    writer.write_string(&header.operation)?;
    write_values(codec, &mut writer, arguments)?;
    Ok(writer.into_inner())
}

pub fn encode_reply(
    codec: &CdrCodec,
    header: &ReplyHeader,
    results: &[DynamicValue],
) -> OrbResult<Vec<u8>> {
    let mut writer = CdrWriter::new(codec.settings());
    write_preamble(&mut writer, MessageType::Reply);
    writer.write_u32(header.request_id);
    writer.write_u32(header.reply_status.id());
    write_values(codec, &mut writer, results)?;
    Ok(writer.into_inner())
}

pub fn encode_close_connection(settings: CodecSettings) -> Vec<u8> {
    let mut writer = CdrWriter::new(settings);
    write_preamble(&mut writer, MessageType::CloseConnection);
    writer.into_inner()
}
