//! Control-plane messages exchanged with the hub.
//!
//! Every hub request is a fixed 6-byte [`Operation`] header followed by
//! an opcode-dependent payload. Register operations are answered with a
//! raw one-byte [`Status`]; deregister operations and [`SubNotify`] go
//! unanswered. Connections are one-shot: one request, then close.

use bytes::{BufMut, BytesMut};

use crate::endpoint::Endpoint;
use crate::error::DecodeError;
use crate::message::{schema_hash, WireMessage};
use crate::ser::{self, Reader, Scalar};

/// Operation codes understood by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    NodeRegister = 1,
    NodeDeregister = 2,
    PubRegister = 3,
    PubDeregister = 4,
    SubRegister = 5,
    SubDeregister = 6,
    SubNotify = 7,
}

impl TryFrom<u16> for Opcode {
    type Error = DecodeError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Self::NodeRegister),
            2 => Ok(Self::NodeDeregister),
            3 => Ok(Self::PubRegister),
            4 => Ok(Self::PubDeregister),
            5 => Ok(Self::SubRegister),
            6 => Ok(Self::SubDeregister),
            7 => Ok(Self::SubNotify),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}

/// Frame header preceding every control payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Operation {
    pub opcode: u16,
    /// Payload byte count following the header.
    pub len: u32,
}

impl Operation {
    /// Encoded header size: `u16` opcode plus `u32` length.
    pub const WIRE_SIZE: usize = 6;
}

impl WireMessage for Operation {
    const SCHEMA_HASH: u64 = schema_hash(b"spoke/Operation{opcode:u16,len:u32}");

    fn encoded_len(&self) -> u32 {
        Self::WIRE_SIZE as u32
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.opcode);
        dst.put_u32_le(self.len);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let opcode = u16::get(r)?;
        let len = u32::get(r)?;
        Ok(Self { opcode, len })
    }
}

/// Reply to a register operation. Zero means accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub error: u8,
}

impl Status {
    pub const OK: Self = Self { error: 0 };
    pub const REJECT: Self = Self { error: 1 };

    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.error == 0
    }
}

impl WireMessage for Status {
    const SCHEMA_HASH: u64 = schema_hash(b"spoke/Status{error:u8}");

    fn encoded_len(&self) -> u32 {
        1
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.error);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { error: u8::get(r)? })
    }
}

/// Directory record for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: u64,
    pub name: String,
}

impl WireMessage for NodeInfo {
    const SCHEMA_HASH: u64 = schema_hash(b"spoke/NodeInfo{id:u64,name:string}");

    fn encoded_len(&self) -> u32 {
        8 + ser::string_len(&self.name)
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.id);
        ser::put_string(dst, &self.name);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let id = u64::get(r)?;
        let name = ser::get_string(r)?;
        Ok(Self { id, name })
    }
}

/// A named channel bound to a payload schema.
///
/// The first registrant on a name establishes `message_hash`; the hub
/// rejects later registrants whose hash differs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicInfo {
    pub id: u64,
    pub name: String,
    pub message_hash: u64,
}

impl WireMessage for TopicInfo {
    const SCHEMA_HASH: u64 =
        schema_hash(b"spoke/TopicInfo{id:u64,name:string,message_hash:u64}");

    fn encoded_len(&self) -> u32 {
        8 + ser::string_len(&self.name) + 8
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.id);
        ser::put_string(dst, &self.name);
        dst.put_u64_le(self.message_hash);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let id = u64::get(r)?;
        let name = ser::get_string(r)?;
        let message_hash = u64::get(r)?;
        Ok(Self {
            id,
            name,
            message_hash,
        })
    }
}

/// Directory record for a publisher: who it is, what it publishes, and
/// where subscribers should connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubInfo {
    pub id: u64,
    pub topic: TopicInfo,
    pub endpoint: Endpoint,
}

impl WireMessage for PubInfo {
    const SCHEMA_HASH: u64 =
        schema_hash(b"spoke/PubInfo{id:u64,topic:TopicInfo,endpoint:Endpoint}");

    fn encoded_len(&self) -> u32 {
        8 + self.topic.encoded_len() + self.endpoint.encoded_len()
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.id);
        self.topic.encode(dst);
        self.endpoint.encode(dst);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let id = u64::get(r)?;
        let topic = TopicInfo::decode(r)?;
        let endpoint = Endpoint::decode(r)?;
        Ok(Self {
            id,
            topic,
            endpoint,
        })
    }
}

/// Directory record for a subscriber. The endpoint is where the hub
/// delivers notifications, not where data arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubInfo {
    pub id: u64,
    pub topic: TopicInfo,
    pub endpoint: Endpoint,
}

impl WireMessage for SubInfo {
    const SCHEMA_HASH: u64 =
        schema_hash(b"spoke/SubInfo{id:u64,topic:TopicInfo,endpoint:Endpoint}");

    fn encoded_len(&self) -> u32 {
        8 + self.topic.encoded_len() + self.endpoint.encoded_len()
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.id);
        self.topic.encode(dst);
        self.endpoint.encode(dst);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let id = u64::get(r)?;
        let topic = TopicInfo::decode(r)?;
        let endpoint = Endpoint::decode(r)?;
        Ok(Self {
            id,
            topic,
            endpoint,
        })
    }
}

/// Hub-to-subscriber announcement of publishers to connect to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubNotify {
    pub publishers: Vec<PubInfo>,
}

impl WireMessage for SubNotify {
    const SCHEMA_HASH: u64 = schema_hash(b"spoke/SubNotify{publishers:vec<PubInfo>}");

    fn encoded_len(&self) -> u32 {
        ser::message_vec_len(&self.publishers)
    }

    fn encode(&self, dst: &mut BytesMut) {
        ser::put_message_vec(dst, &self.publishers);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let publishers = ser::get_message_vec(r)?;
        Ok(Self { publishers })
    }
}

/// Frame a control message: [`Operation`] header plus payload.
#[must_use]
pub fn encode_frame<M: WireMessage>(opcode: Opcode, msg: &M) -> BytesMut {
    let len = msg.encoded_len();
    let mut buf = BytesMut::with_capacity(Operation::WIRE_SIZE + len as usize);
    Operation {
        opcode: opcode as u16,
        len,
    }
    .encode(&mut buf);
    msg.encode(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pub_info(id: u64) -> PubInfo {
        PubInfo {
            id,
            topic: TopicInfo {
                id: id + 1,
                name: "/test_topic".to_string(),
                message_hash: 0xFEED,
            },
            endpoint: Endpoint::new("127.0.0.1", 3000),
        }
    }

    #[test]
    fn test_operation_header_layout() {
        let op = Operation {
            opcode: Opcode::PubRegister as u16,
            len: 0x0102_0304,
        };
        let bytes = op.to_bytes();
        assert_eq!(bytes.len(), Operation::WIRE_SIZE);
        assert_eq!(hex::encode(&bytes), "030004030201");
    }

    #[test]
    fn test_status_round_trip() {
        let bytes = Status::REJECT.to_bytes();
        assert_eq!(bytes.len(), 1);
        let status = Status::from_bytes(&bytes).unwrap();
        assert!(!status.is_ok());
    }

    #[test]
    fn test_opcode_try_from() {
        assert_eq!(Opcode::try_from(7).unwrap(), Opcode::SubNotify);
        assert_eq!(Opcode::try_from(0), Err(DecodeError::UnknownOpcode(0)));
        assert_eq!(Opcode::try_from(8), Err(DecodeError::UnknownOpcode(8)));
    }

    #[test]
    fn test_node_info_round_trip() {
        let info = NodeInfo {
            id: 42,
            name: "talker".to_string(),
        };
        let bytes = info.to_bytes();
        assert_eq!(bytes.len() as u32, info.encoded_len());
        assert_eq!(NodeInfo::from_bytes(&bytes).unwrap(), info);
    }

    #[test]
    fn test_pub_info_round_trip() {
        let info = pub_info(7);
        let bytes = info.to_bytes();
        assert_eq!(bytes.len() as u32, info.encoded_len());

        let mut r = Reader::new(&bytes);
        let decoded = PubInfo::decode(&mut r).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(r.position() as u32, info.encoded_len());
    }

    #[test]
    fn test_sub_notify_round_trip() {
        for count in [0usize, 1, 3] {
            let notify = SubNotify {
                publishers: (0..count as u64).map(pub_info).collect(),
            };
            let bytes = notify.to_bytes();
            assert_eq!(bytes.len() as u32, notify.encoded_len());
            assert_eq!(SubNotify::from_bytes(&bytes).unwrap(), notify);
        }
    }

    #[test]
    fn test_truncated_frames_fail() {
        let notify = SubNotify {
            publishers: vec![pub_info(1), pub_info(2)],
        };
        let bytes = notify.to_bytes();
        for k in 0..bytes.len() {
            assert!(SubNotify::from_bytes(&bytes[..k]).is_err());
        }
    }

    #[test]
    fn test_encode_frame_layout() {
        let status = Status::OK;
        let frame = encode_frame(Opcode::NodeRegister, &status);
        assert_eq!(frame.len(), Operation::WIRE_SIZE + 1);

        let op = Operation::from_bytes(&frame).unwrap();
        assert_eq!(op.opcode, Opcode::NodeRegister as u16);
        assert_eq!(op.len, 1);
        assert_eq!(frame[Operation::WIRE_SIZE], 0);
    }

    #[test]
    fn test_schema_hashes_differ_per_record() {
        assert_ne!(PubInfo::SCHEMA_HASH, SubInfo::SCHEMA_HASH);
        assert_ne!(NodeInfo::SCHEMA_HASH, TopicInfo::SCHEMA_HASH);
    }
}
