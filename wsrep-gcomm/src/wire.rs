// Fixed wire header:
// {version:1, type:1, flags:1, reserved:1, source_uuid:16, seq:8,
// payload_len:4}, the payload itself is the rmp-serde encoding of
// `Msg`. A single flat `Msg` type, rmp-serde over a length-prefixed
// buffer, covering the GMCast/EVS/PC families below.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wsrep_base::{bad_request, Error, Result, Seqno};

pub const WIRE_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 1 + 1 + 1 + 1 + 16 + 8 + 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MsgHeader {
    pub version: u8,
    pub msg_type: u8,
    pub flags: u8,
    pub source_uuid: Uuid,
    pub seq: u64,
    pub payload_len: u32,
}

impl MsgHeader {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.version);
        out.push(self.msg_type);
        out.push(self.flags);
        out.push(0); // reserved
        out.extend_from_slice(self.source_uuid.as_bytes());
        out.extend_from_slice(&self.seq.to_be_bytes());
        out.extend_from_slice(&self.payload_len.to_be_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(bad_request("short message header"));
        }
        let version = buf[0];
        if version != WIRE_VERSION {
            return Err(bad_request(format!("unsupported wire version {version}")));
        }
        let msg_type = buf[1];
        let flags = buf[2];
        let source_uuid = Uuid::from_slice(&buf[4..20]).map_err(|e| bad_request(e.to_string()))?;
        let seq = u64::from_be_bytes(buf[20..28].try_into().unwrap());
        let payload_len = u32::from_be_bytes(buf[28..32].try_into().unwrap());
        Ok(MsgHeader {
            version,
            msg_type,
            flags,
            source_uuid,
            seq,
            payload_len,
        })
    }
}

/// The GMCast/EVS/PC message families, tagged so a single framed byte
/// stream carries all three protocols plus application payloads
/// (which themselves carry GCS action framing, opaque to this layer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Msg {
    // GMCast: peer discovery and liveness.
    GossipHello { seeds: Vec<String> },
    Heartbeat,

    // EVS: causal FIFO-per-source delivery plus the membership protocol.
    EvsUser {
        source: Uuid,
        source_seq: u64,
        safe: bool,
        payload: Vec<u8>,
    },
    EvsGap {
        source: Uuid,
        from: u64,
        to: u64,
    },
    EvsJoin {
        member: Uuid,
    },
    EvsInstall {
        view_uuid: Uuid,
        view_seq: u64,
        members: Vec<Uuid>,
    },

    // PC: primacy and arbitrator tie-break voting.
    PcState {
        member: Uuid,
        last_primary_view_seq: u64,
    },
    PcInstall {
        view_uuid: Uuid,
        view_seq: u64,
        primary: bool,
    },
    PcVote {
        member: Uuid,
        view_uuid: Uuid,
        in_favor: bool,
    },

    /// An ordered GCS action, opaque past this point.
    Payload { seqno: i64, bytes: Vec<u8> },
}

pub fn encode_frame(header: &MsgHeader, msg: &Msg) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(msg).map_err(Error::from)?;
    let mut header = *header;
    header.payload_len = payload.len() as u32;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    header.encode(&mut out);
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode_frame(buf: &[u8]) -> Result<(MsgHeader, Msg)> {
    let header = MsgHeader::decode(buf)?;
    let payload_end = HEADER_LEN + header.payload_len as usize;
    if buf.len() < payload_end {
        return Err(bad_request("frame shorter than declared payload_len"));
    }
    let msg: Msg = rmp_serde::from_slice(&buf[HEADER_LEN..payload_end]).map_err(Error::from)?;
    Ok((header, msg))
}

pub fn payload_seqno(msg: &Msg) -> Option<Seqno> {
    match msg {
        Msg::Payload { seqno, .. } => Some(Seqno(*seqno)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_payload_frame() {
        let header = MsgHeader {
            version: WIRE_VERSION,
            msg_type: 0,
            flags: 0,
            source_uuid: Uuid::from_u128(42),
            seq: 7,
            payload_len: 0,
        };
        let msg = Msg::Payload {
            seqno: 9,
            bytes: vec![1, 2, 3],
        };
        let framed = encode_frame(&header, &msg).unwrap();
        let (decoded_header, decoded_msg) = decode_frame(&framed).unwrap();
        assert_eq!(decoded_header.seq, 7);
        assert_eq!(decoded_header.source_uuid, Uuid::from_u128(42));
        match decoded_msg {
            Msg::Payload { seqno, bytes } => {
                assert_eq!(seqno, 9);
                assert_eq!(bytes, vec![1, 2, 3]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(MsgHeader::decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let mut buf = vec![0u8; HEADER_LEN];
        buf[0] = 99;
        assert!(MsgHeader::decode(&buf).is_err());
    }
}
