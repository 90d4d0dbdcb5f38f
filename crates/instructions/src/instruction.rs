//! Instructions and their raw 4-tuple encoding.

use portal_primitives::ShardId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    content::InstructionContent,
    types::{InstStatus, MetaType},
};

/// Placeholder in the shard slot of instructions not tied to a shard.
pub const NO_SHARD: &str = "-1";

/// Raw `[metadataType, shardID-or-"-1", status, contentPayload]` tuple.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInstruction(pub [String; 4]);

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown metadata type {0}")]
    UnknownMetaType(String),

    #[error("invalid shard id {0}")]
    InvalidShard(String),

    #[error("unknown instruction status {0}")]
    UnknownStatus(String),

    #[error("content for {0:?}: {1}")]
    Content(MetaType, #[source] serde_json::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A decided instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    shard_id: Option<ShardId>,
    status: InstStatus,
    content: InstructionContent,
}

impl Instruction {
    pub fn new(shard_id: Option<ShardId>, status: InstStatus, content: InstructionContent) -> Self {
        Self {
            shard_id,
            status,
            content,
        }
    }

    pub fn meta_type(&self) -> MetaType {
        self.content.meta_type()
    }

    pub fn shard_id(&self) -> Option<ShardId> {
        self.shard_id
    }

    pub fn status(&self) -> InstStatus {
        self.status
    }

    pub fn content(&self) -> &InstructionContent {
        &self.content
    }

    pub fn to_raw(&self) -> CodecResult<RawInstruction> {
        let meta = self.meta_type();
        let payload = self
            .content
            .to_json()
            .map_err(|e| CodecError::Content(meta, e))?;
        let shard = self
            .shard_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| NO_SHARD.to_owned());
        Ok(RawInstruction([
            meta.code().to_string(),
            shard,
            self.status.as_str().to_owned(),
            payload,
        ]))
    }

    pub fn from_raw(raw: &RawInstruction) -> CodecResult<Self> {
        let [meta, shard, status, payload] = &raw.0;

        let meta = meta
            .parse::<u16>()
            .ok()
            .and_then(MetaType::from_code)
            .ok_or_else(|| CodecError::UnknownMetaType(meta.clone()))?;

        let shard_id = if shard == NO_SHARD {
            None
        } else {
            Some(
                shard
                    .parse::<ShardId>()
                    .map_err(|_| CodecError::InvalidShard(shard.clone()))?,
            )
        };

        let status = status
            .parse::<InstStatus>()
            .map_err(CodecError::UnknownStatus)?;

        let content = InstructionContent::from_json(meta, payload)
            .map_err(|e| CodecError::Content(meta, e))?;

        Ok(Self {
            shard_id,
            status,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use portal_primitives::{Collaterals, TokenId};

    use super::*;
    use crate::{
        content::{CustodianDepositContent, TpLiquidationContent},
        reject::RejectReason,
    };

    #[test]
    fn test_raw_shape_of_shard_instruction() {
        let inst = Instruction::new(
            Some(3),
            InstStatus::Rejected,
            InstructionContent::CustodianDeposit(CustodianDepositContent {
                tx_id: "tx".to_owned(),
                custodian: "c1".into(),
                asset: TokenId::native(),
                amount: 0,
                remote_addresses: BTreeMap::new(),
                reject_reason: Some(RejectReason::ZeroAmount),
            }),
        );
        let raw = inst.to_raw().expect("encode");
        assert_eq!(raw.0[0], "200");
        assert_eq!(raw.0[1], "3");
        assert_eq!(raw.0[2], "rejected");
        assert!(raw.0[3].contains("zero_amount"));

        let back = Instruction::from_raw(&raw).expect("decode");
        assert_eq!(back, inst);
    }

    #[test]
    fn test_system_instruction_has_no_shard() {
        let inst = Instruction::new(
            None,
            InstStatus::Liquidated,
            InstructionContent::TpLiquidation(TpLiquidationContent {
                custodian: "c1".into(),
                token: "pBTC".into(),
                ratio: 110,
                pool_collateral: Collaterals::native_only(1_100),
                holding_amount: 1_000,
                released_redeems: Vec::new(),
                pub_token_liability: 1_000,
            }),
        );
        let raw = inst.to_raw().expect("encode");
        assert_eq!(raw.0[1], NO_SHARD);
        assert_eq!(Instruction::from_raw(&raw).expect("decode"), inst);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let raw = RawInstruction(["999".into(), NO_SHARD.into(), "accepted".into(), "{}".into()]);
        assert!(matches!(Instruction::from_raw(&raw), Err(CodecError::UnknownMetaType(_))));

        let raw = RawInstruction(["211".into(), "x".into(), "accepted".into(), "{}".into()]);
        assert!(matches!(Instruction::from_raw(&raw), Err(CodecError::InvalidShard(_))));

        let raw = RawInstruction(["211".into(), NO_SHARD.into(), "accepted".into(), "{}".into()]);
        assert!(matches!(
            Instruction::from_raw(&raw),
            Err(CodecError::Content(MetaType::TpLiquidation, _))
        ));
    }
}
