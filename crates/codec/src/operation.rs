//! Numeric operation tags for the rule grammar, grounded on the `#define`
//! table in `include/cheferd/networking/interface_definitions.hpp`. The
//! original reuses small integers across two unrelated namespaces (top-level
//! `m_operation_type` tags and housekeeping/collect `m_operation_subtype`
//! tags); we keep the two tag spaces but give every tag a distinct value so
//! a rule string's leading token is unambiguous on its own.

use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OperationTag {
    StageHandshake = 0,
    StageReady = 1,
    CreateHskRule = 4,
    CreateEnfRule = 6,
    LocalHandshake = 11,
    StageHandshakeInfo = 12,
    CollectGlobalStats = 15,
    CollectGlobalStatsAggregated = 16,
    CollectEntityStats = 14,
    AdminPolicy = 20,
}

impl OperationTag {
    pub fn from_i32(value: i32) -> Result<Self, CodecError> {
        Ok(match value {
            0 => OperationTag::StageHandshake,
            1 => OperationTag::StageReady,
            4 => OperationTag::CreateHskRule,
            6 => OperationTag::CreateEnfRule,
            11 => OperationTag::LocalHandshake,
            12 => OperationTag::StageHandshakeInfo,
            14 => OperationTag::CollectEntityStats,
            15 => OperationTag::CollectGlobalStats,
            16 => OperationTag::CollectGlobalStatsAggregated,
            20 => OperationTag::AdminPolicy,
            other => return Err(CodecError::UnknownOperation(other)),
        })
    }
}

/// Housekeeping sub-variant tag, carried in a `CreateHskRule`'s own first
/// field (mirrors `HSK_CREATE_CHANNEL` / `HSK_CREATE_OBJECT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum HousekeepingKind {
    CreateChannel = 1,
    CreateObject = 2,
}

impl HousekeepingKind {
    pub fn from_i32(value: i32) -> Result<Self, CodecError> {
        Ok(match value {
            1 => HousekeepingKind::CreateChannel,
            2 => HousekeepingKind::CreateObject,
            other => return Err(CodecError::UnknownOperation(other)),
        })
    }
}
