//! Core types for the loyalty ledger
//!
//! All durable values cross the store boundary in their JSON wire form,
//! with the exact field names external indexers and auditors consume
//! (`customerID`, `lastUpdated`, `transactionID`, ...).

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A loyalty-point account, keyed by customer ID in the world state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    /// Customer ID (non-empty, unique)
    #[serde(rename = "customerID")]
    pub customer_id: String,

    /// Point balance, never negative after a successful operation
    pub balance: i64,

    /// Timestamp of the last committed mutation (RFC3339, UTC)
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl LoyaltyAccount {
    /// Create a fresh account with zero balance
    pub fn new(customer_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            customer_id: customer_id.into(),
            balance: 0,
            last_updated: at,
        }
    }

    /// Encode to the store's wire form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from the store's wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Validate account invariants
    pub fn validate(&self) -> Result<()> {
        if self.customer_id.is_empty() {
            return Err(Error::Validation("customer ID is required".to_string()));
        }
        if self.balance < 0 {
            return Err(Error::Validation("balance cannot be negative".to_string()));
        }
        Ok(())
    }
}

/// Kind of committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionType {
    /// Account creation (amount is always 0)
    #[serde(rename = "CREATE_ACCOUNT")]
    CreateAccount,
    /// Points issued by the issuer organization
    #[serde(rename = "ISSUE")]
    Issue,
    /// Points redeemed
    #[serde(rename = "REDEEM")]
    Redeem,
    /// Debit side of a transfer
    #[serde(rename = "TRANSFER_OUT")]
    TransferOut,
    /// Credit side of a transfer
    #[serde(rename = "TRANSFER_IN")]
    TransferIn,
}

impl TransitionType {
    /// Wire name of this transition type
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionType::CreateAccount => "CREATE_ACCOUNT",
            TransitionType::Issue => "ISSUE",
            TransitionType::Redeem => "REDEEM",
            TransitionType::TransferOut => "TRANSFER_OUT",
            TransitionType::TransferIn => "TRANSFER_IN",
        }
    }

    /// Named event channel subscribers listen on
    pub fn event_name(&self) -> &'static str {
        match self {
            TransitionType::CreateAccount => "CreateAccountEvent",
            TransitionType::Issue => "IssuePointsEvent",
            TransitionType::Redeem => "RedeemPointsEvent",
            TransitionType::TransferOut => "TransferOutEvent",
            TransitionType::TransferIn => "TransferInEvent",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record describing one committed mutation
///
/// Emitted as a side effect of a committed write; never stored as
/// queryable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Transaction ID assigned by the enclosing commit context
    #[serde(rename = "transactionID")]
    pub transaction_id: String,

    /// Account the mutation applied to
    #[serde(rename = "customerID")]
    pub customer_id: String,

    /// Kind of mutation
    #[serde(rename = "type")]
    pub transition_type: TransitionType,

    /// Amount moved (0 for CREATE_ACCOUNT, positive otherwise)
    pub amount: i64,

    /// Equals the account's `lastUpdated` at commit time
    pub timestamp: DateTime<Utc>,

    /// Free text, may be empty
    pub description: String,
}

/// One version of an account as recorded by the world-state store
///
/// Produced only by history queries, never persisted separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Account snapshot at this version
    pub record: LoyaltyAccount,

    /// Transaction that committed this version
    #[serde(rename = "txId")]
    pub tx_id: String,

    /// Commit timestamp of this version
    pub timestamp: DateTime<Utc>,

    /// Always false for this engine; accounts are never removed
    #[serde(rename = "isDelete")]
    pub is_delete: bool,
}
