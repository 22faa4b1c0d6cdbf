//! Southbound response payloads, grounded on the `StageResponse` hierarchy
//! (`stage_response_ack.hpp`, `stage_response_handshake.hpp`,
//! `stage_response_stats.hpp`, `stage_response_stat.hpp`) and the raw
//! structs they wrap (`StageSimplifiedHandshakeRaw`, `StatsGlobalRaw`).
//!
//! The original's handshake struct uses fixed-size `char[]` buffers sized
//! for a real co-resident C++ stage process; since both ends here are this
//! workspace's own framing, the fields keep their shape but switch to
//! length-prefixed UTF-8 strings, which removes the fixed buffer entirely
//! instead of guessing a safe bound for it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_operation::AckCode;

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_i32(buf: &mut impl Buf) -> Option<i32> {
    if buf.remaining() < 4 {
        return None;
    }
    Some(buf.get_i32_le())
}

fn get_string(buf: &mut impl Buf) -> Option<String> {
    if buf.remaining() < 4 {
        return None;
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return None;
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).ok()
}

/// `StageSimplifiedHandshakeRaw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHandshakeInfo {
    pub name: String,
    pub env: String,
    pub pid: i32,
    pub ppid: i32,
    pub hostname: String,
    pub user: String,
}

impl StageHandshakeInfo {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_string(&mut buf, &self.name);
        put_string(&mut buf, &self.env);
        buf.put_i32_le(self.pid);
        buf.put_i32_le(self.ppid);
        put_string(&mut buf, &self.hostname);
        put_string(&mut buf, &self.user);
        buf.freeze()
    }

    pub fn decode(mut bytes: impl Buf) -> Option<Self> {
        Some(Self {
            name: get_string(&mut bytes)?,
            env: get_string(&mut bytes)?,
            pid: get_i32(&mut bytes)?,
            ppid: get_i32(&mut bytes)?,
            hostname: get_string(&mut bytes)?,
            user: get_string(&mut bytes)?,
        })
    }
}

/// `StatsGlobalRaw`: a single aggregate rate (spec's `StatGlobal`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatGlobal {
    pub total_rate: f64,
}

impl StatGlobal {
    pub const ENCODED_LEN: usize = 8;

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        buf.put_f64_le(self.total_rate);
        buf.freeze()
    }

    pub fn decode(mut bytes: impl Buf) -> Option<Self> {
        if bytes.remaining() < Self::ENCODED_LEN {
            return None;
        }
        Some(Self {
            total_rate: bytes.get_f64_le(),
        })
    }
}

/// A per-entity (job/channel) observed rate (spec's `StatEntity`).
#[derive(Debug, Clone, PartialEq)]
pub struct StatEntity {
    pub entity: String,
    pub rate: f64,
}

impl StatEntity {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_string(&mut buf, &self.entity);
        buf.put_f64_le(self.rate);
        buf.freeze()
    }

    pub fn decode(mut bytes: impl Buf) -> Option<Self> {
        let entity = get_string(&mut bytes)?;
        if bytes.remaining() < 8 {
            return None;
        }
        Some(Self {
            entity,
            rate: bytes.get_f64_le(),
        })
    }
}

/// A collected batch of per-entity rates (spec's `StatCollection`), used by
/// `COLLECT_GLOBAL_STATS`/`COLLECT_ENTITY_STATS` responses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatCollection {
    pub entries: Vec<StatEntity>,
}

impl StatCollection {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.entries.len() as u32);
        for entry in &self.entries {
            buf.put_slice(&entry.encode());
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: impl Buf) -> Option<Self> {
        if bytes.remaining() < 4 {
            return None;
        }
        let count = bytes.get_u32_le() as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(StatEntity::decode(&mut bytes)?);
        }
        Some(Self { entries })
    }
}

/// A decoded southbound response. The caller already knows which variant to
/// expect (it issued the matching request), so this is a plain union rather
/// than a self-describing tagged payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack(AckCode),
    StageHandshake(StageHandshakeInfo),
    StatGlobal(StatGlobal),
    StatCollection(StatCollection),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn handshake_info_round_trips() {
        let info = StageHandshakeInfo {
            name: "tensor".into(),
            env: "prod".into(),
            pid: 4242,
            ppid: 1,
            hostname: "node-a".into(),
            user: "alice".into(),
        };
        assert_eq!(StageHandshakeInfo::decode(info.encode()).unwrap(), info);
    }

    #[test]
    fn stat_collection_round_trips_with_multiple_entries() {
        let collection = StatCollection {
            entries: vec![
                StatEntity {
                    entity: "tensor+prod".into(),
                    rate: 512.0,
                },
                StatEntity {
                    entity: "rocks+prod".into(),
                    rate: 128.5,
                },
            ],
        };
        assert_eq!(
            StatCollection::decode(collection.encode()).unwrap(),
            collection
        );
    }
}
