//! The southbound framed message header, grounded on `ControlOperation` in
//! `include/cheferd/networking/interface_definitions.hpp`: four `i32`
//! fields preceding every payload written to (or read from) a stage socket.
//!
//! The original memcpy's the raw struct over the wire, relying on both ends
//! sharing a platform ABI. We keep all four fields (see `SPEC_FULL.md` §2 —
//! `op_id` is not in the distilled spec's header but round-trips on this
//! wire) and fix the byte order to little-endian so the framing is portable
//! instead of host-ABI-dependent.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use ratectl_codec::OperationTag;

pub const HEADER_LEN: usize = 16;

/// `op_id` is a per-connection sequence number assigned by the session's
/// submitting worker, not by the caller — see `SPEC_FULL.md` §2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlOperation {
    pub op_id: i32,
    pub op_type: i32,
    pub op_subtype: i32,
    pub size: i32,
}

impl ControlOperation {
    pub fn new(op_id: i32, op_type: OperationTag, op_subtype: i32, size: usize) -> Self {
        Self {
            op_id,
            op_type: op_type as i32,
            op_subtype,
            size: size as i32,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_i32_le(self.op_id);
        buf.put_i32_le(self.op_type);
        buf.put_i32_le(self.op_subtype);
        buf.put_i32_le(self.size);
        buf.freeze()
    }

    pub fn decode(mut bytes: impl Buf) -> Option<Self> {
        if bytes.remaining() < HEADER_LEN {
            return None;
        }
        Some(Self {
            op_id: bytes.get_i32_le(),
            op_type: bytes.get_i32_le(),
            op_subtype: bytes.get_i32_le(),
            size: bytes.get_i32_le(),
        })
    }
}

/// `ACK`/`AckCode`: the fixed-width reply the stage returns for any
/// operation that carries no richer response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    Ok = 1,
    Error = 0,
}

impl AckCode {
    pub const ENCODED_LEN: usize = 4;

    pub fn encode(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        buf.put_i32_le(self as i32);
        buf.freeze()
    }

    pub fn decode(mut bytes: impl Buf) -> Option<Self> {
        if bytes.remaining() < Self::ENCODED_LEN {
            return None;
        }
        Some(match bytes.get_i32_le() {
            1 => AckCode::Ok,
            _ => AckCode::Error,
        })
    }
}
