//! Actions submitted by users, custodians, feeders and the treasury.

use std::collections::BTreeMap;

use portal_primitives::{IncAddress, PortingId, RedeemId, ShardId, TokenId};
use serde::{Deserialize, Serialize};

/// A transfer observed on the external chain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelayTransfer {
    pub receiver: String,
    pub amount: u64,
}

/// Result of verifying an external-chain proof, as reported by the relay.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelayProof {
    pub verified: bool,
    /// Porting or redeem id carried in the transaction memo.
    pub memo: String,
    pub transfers: Vec<RelayTransfer>,
}

impl RelayProof {
    /// Sum of transfers paid to `receiver`.
    pub fn paid_to(&self, receiver: &str) -> u64 {
        self.transfers
            .iter()
            .filter(|t| t.receiver == receiver)
            .fold(0u64, |acc, t| acc.saturating_add(t.amount))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CustodianDeposit {
        custodian: IncAddress,
        asset: TokenId,
        amount: u64,
        #[serde(default)]
        remote_addresses: BTreeMap<TokenId, String>,
    },
    CustodianWithdraw {
        custodian: IncAddress,
        asset: TokenId,
        amount: u64,
    },
    PortingRequest {
        porting_id: PortingId,
        token: TokenId,
        porter: IncAddress,
        amount: u64,
        fee: u64,
        #[serde(default)]
        shard_height: u64,
    },
    RequestPTokens {
        porting_id: PortingId,
        token: TokenId,
        porter: IncAddress,
        amount: u64,
        proof: RelayProof,
    },
    ExchangeRates {
        sender: IncAddress,
        rates: BTreeMap<TokenId, u64>,
    },
    RedeemRequest {
        redeem_id: RedeemId,
        token: TokenId,
        redeemer: IncAddress,
        remote_address: String,
        amount: u64,
        fee: u64,
    },
    RedeemMatching {
        redeem_id: RedeemId,
        custodian: IncAddress,
    },
    UnlockCollateral {
        redeem_id: RedeemId,
        token: TokenId,
        custodian: IncAddress,
        redeem_amount: u64,
        proof: RelayProof,
    },
    CustodianTopUp {
        custodian: IncAddress,
        token: TokenId,
        asset: TokenId,
        deposit: u64,
        #[serde(default)]
        free_collateral_selected: bool,
    },
    WaitingPortingTopUp {
        porting_id: PortingId,
        custodian: IncAddress,
        token: TokenId,
        asset: TokenId,
        deposit: u64,
        #[serde(default)]
        free_collateral_selected: bool,
    },
    RedeemFromLiquidationPool {
        token: TokenId,
        redeemer: IncAddress,
        amount: u64,
        fee: u64,
    },
    DistributeEpochRewards {
        rewards: BTreeMap<TokenId, u64>,
    },
    WithdrawReward {
        custodian: IncAddress,
        token: TokenId,
    },
}

/// An action together with where it came from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShardAction {
    pub shard_id: ShardId,
    /// Position within the shard block.
    pub index: u32,
    pub tx_id: String,
    pub action: Action,
}

/// Sorts actions into the canonical evaluation order: by shard, then by
/// position within the shard.
pub fn canonicalize(actions: &mut [ShardAction]) {
    actions.sort_by(|a, b| (a.shard_id, a.index).cmp(&(b.shard_id, b.index)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn withdraw(shard_id: ShardId, index: u32) -> ShardAction {
        ShardAction {
            shard_id,
            index,
            tx_id: format!("{shard_id}-{index}"),
            action: Action::WithdrawReward {
                custodian: "c".into(),
                token: TokenId::native(),
            },
        }
    }

    #[test]
    fn test_canonical_order() {
        let mut actions = vec![withdraw(2, 0), withdraw(0, 5), withdraw(1, 1), withdraw(0, 1)];
        canonicalize(&mut actions);
        let ids: Vec<_> = actions.iter().map(|a| a.tx_id.as_str()).collect();
        assert_eq!(ids, ["0-1", "0-5", "1-1", "2-0"]);
    }

    #[test]
    fn test_action_json_shape() {
        let json = r#"{
            "shard_id": 1,
            "index": 0,
            "tx_id": "tx1",
            "action": {
                "type": "custodian_deposit",
                "custodian": "c1",
                "asset": "0000000000000000000000000000000000000000000000000000000000000004",
                "amount": 5000,
                "remote_addresses": { "pBNB": "b1" }
            }
        }"#;
        let parsed: ShardAction = serde_json::from_str(json).expect("parse action");
        match parsed.action {
            Action::CustodianDeposit { asset, remote_addresses, .. } => {
                assert!(asset.is_native());
                assert_eq!(
                    remote_addresses.get(&TokenId::from("pBNB")).map(String::as_str),
                    Some("b1")
                );
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_paid_to_sums_transfers() {
        let proof = RelayProof {
            verified: true,
            memo: "p1".to_owned(),
            transfers: vec![
                RelayTransfer { receiver: "a".to_owned(), amount: 3 },
                RelayTransfer { receiver: "b".to_owned(), amount: 4 },
                RelayTransfer { receiver: "a".to_owned(), amount: 5 },
            ],
        };
        assert_eq!(proof.paid_to("a"), 8);
        assert_eq!(proof.paid_to("c"), 0);
    }
}
