//! Account state-transition engine
//!
//! Every operation is one invariant-checked transition over the world
//! state: validate input, consult the access policy, re-read current
//! state, compute the new state, buffer the write, and emit a transition
//! record into the transaction context. Nothing is cached between
//! invocations, and a failing path buffers no writes, so an abandoned
//! transaction leaves the store untouched.
//!
//! The engine is deterministic: given the same transaction id, timestamp,
//! caller, inputs, and store contents, it produces the same writes and
//! records regardless of execution environment.

use crate::auth::{AccessPolicy, ClientIdentity, OperationKind};
use crate::history;
use crate::store::WorldState;
use crate::types::{HistoryEntry, LoyaltyAccount, TransitionRecord, TransitionType};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Execution context of one submitted transaction
///
/// Carries the world-state view, the commit-context facts (transaction id,
/// timestamp, caller identity), and the transition records emitted so far.
/// The submission layer publishes the records only after the store commit
/// succeeds.
pub struct TxContext<'a> {
    world: &'a mut dyn WorldState,
    tx_id: String,
    timestamp: DateTime<Utc>,
    caller: ClientIdentity,
    records: Vec<TransitionRecord>,
}

impl<'a> TxContext<'a> {
    /// Create a context for one transaction
    pub fn new(
        world: &'a mut dyn WorldState,
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        caller: ClientIdentity,
    ) -> Self {
        Self {
            world,
            tx_id: tx_id.into(),
            timestamp,
            caller,
            records: Vec::new(),
        }
    }

    /// Transaction id assigned by the commit context
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Commit timestamp; one `now` per transaction
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Caller identity attached to this invocation
    pub fn caller(&self) -> &ClientIdentity {
        &self.caller
    }

    /// Consume the context, yielding the emitted records in order
    pub fn into_records(self) -> Vec<TransitionRecord> {
        self.records
    }

    fn emit(
        &mut self,
        customer_id: &str,
        transition_type: TransitionType,
        amount: i64,
        description: String,
    ) {
        self.records.push(TransitionRecord {
            transaction_id: self.tx_id.clone(),
            customer_id: customer_id.to_string(),
            transition_type,
            amount,
            timestamp: self.timestamp,
            description,
        });
    }
}

/// The account state machine
#[derive(Debug, Clone)]
pub struct Engine {
    policy: AccessPolicy,
}

impl Engine {
    /// Engine enforcing the given access policy
    pub fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    /// Create a new account with zero balance
    ///
    /// Fails if `customer_id` is empty or the account already exists.
    pub fn create_account(
        &self,
        ctx: &mut TxContext<'_>,
        customer_id: &str,
    ) -> Result<LoyaltyAccount> {
        self.policy.check(OperationKind::CreateAccount, ctx.caller())?;
        require_customer_id(customer_id)?;

        if ctx.world.get(customer_id)?.is_some() {
            return Err(Error::AlreadyExists(customer_id.to_string()));
        }

        let account = LoyaltyAccount::new(customer_id, ctx.timestamp);
        write_account(ctx.world, &account)?;

        ctx.emit(
            customer_id,
            TransitionType::CreateAccount,
            0,
            "Initial account creation".to_string(),
        );

        tracing::info!(customer_id, tx_id = %ctx.tx_id, "Account created");
        Ok(account)
    }

    /// Add points to an account; restricted to the issuer organization
    pub fn issue_points(
        &self,
        ctx: &mut TxContext<'_>,
        customer_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<LoyaltyAccount> {
        self.policy.check(OperationKind::IssuePoints, ctx.caller())?;
        require_customer_id(customer_id)?;
        require_positive_amount(amount)?;

        let mut account = read_account(ctx.world, customer_id)?
            .ok_or_else(|| Error::NotFound(customer_id.to_string()))?;

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| Error::Validation("balance overflow".to_string()))?;
        account.last_updated = ctx.timestamp;
        write_account(ctx.world, &account)?;

        ctx.emit(
            customer_id,
            TransitionType::Issue,
            amount,
            description.to_string(),
        );

        tracing::info!(
            customer_id,
            amount,
            balance = account.balance,
            tx_id = %ctx.tx_id,
            "Points issued"
        );
        Ok(account)
    }

    /// Remove points from an account, guarded by the balance invariant
    pub fn redeem_points(
        &self,
        ctx: &mut TxContext<'_>,
        customer_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<LoyaltyAccount> {
        self.policy.check(OperationKind::RedeemPoints, ctx.caller())?;
        require_customer_id(customer_id)?;
        require_positive_amount(amount)?;

        let mut account = read_account(ctx.world, customer_id)?
            .ok_or_else(|| Error::NotFound(customer_id.to_string()))?;

        if account.balance < amount {
            return Err(Error::InsufficientBalance {
                balance: account.balance,
                requested: amount,
            });
        }

        account.balance -= amount;
        account.last_updated = ctx.timestamp;
        write_account(ctx.world, &account)?;

        ctx.emit(
            customer_id,
            TransitionType::Redeem,
            amount,
            description.to_string(),
        );

        tracing::info!(
            customer_id,
            amount,
            balance = account.balance,
            tx_id = %ctx.tx_id,
            "Points redeemed"
        );
        Ok(account)
    }

    /// Move points between two accounts as one coordinated pair of writes
    ///
    /// Both writes share this transaction's commit, and both records share
    /// its transaction id. Communicates only pass/fail; callers re-query
    /// if they need the resulting balances.
    pub fn transfer_points(
        &self,
        ctx: &mut TxContext<'_>,
        source_id: &str,
        target_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<()> {
        self.policy.check(OperationKind::TransferPoints, ctx.caller())?;
        if source_id.is_empty() {
            return Err(Error::Validation(
                "source customer ID cannot be empty".to_string(),
            ));
        }
        if target_id.is_empty() {
            return Err(Error::Validation(
                "target customer ID cannot be empty".to_string(),
            ));
        }
        if source_id == target_id {
            return Err(Error::Validation(
                "source and target customer IDs must be different".to_string(),
            ));
        }
        require_positive_amount(amount)?;

        // Source checked before target; both must exist before any mutation
        let mut source = read_account(ctx.world, source_id)?
            .ok_or_else(|| Error::NotFound(source_id.to_string()))?;
        let mut target = read_account(ctx.world, target_id)?
            .ok_or_else(|| Error::NotFound(target_id.to_string()))?;

        if source.balance < amount {
            return Err(Error::InsufficientBalance {
                balance: source.balance,
                requested: amount,
            });
        }

        source.balance -= amount;
        source.last_updated = ctx.timestamp;
        target.balance = target
            .balance
            .checked_add(amount)
            .ok_or_else(|| Error::Validation("balance overflow".to_string()))?;
        target.last_updated = ctx.timestamp;

        // Deterministic order: source then target; all-or-nothing
        // durability is the store's commit boundary
        write_account(ctx.world, &source)?;
        write_account(ctx.world, &target)?;

        ctx.emit(
            source_id,
            TransitionType::TransferOut,
            amount,
            format!("Transfer to {}: {}", target_id, description),
        );
        ctx.emit(
            target_id,
            TransitionType::TransferIn,
            amount,
            format!("Transfer from {}: {}", source_id, description),
        );

        tracing::info!(
            source_id,
            target_id,
            amount,
            tx_id = %ctx.tx_id,
            "Points transferred"
        );
        Ok(())
    }

    /// Read the current account state; no write, no event
    pub fn query_account(
        &self,
        ctx: &mut TxContext<'_>,
        customer_id: &str,
    ) -> Result<LoyaltyAccount> {
        self.policy.check(OperationKind::QueryAccount, ctx.caller())?;
        require_customer_id(customer_id)?;

        read_account(ctx.world, customer_id)?
            .ok_or_else(|| Error::NotFound(customer_id.to_string()))
    }

    /// Replay the account's committed version history, oldest first
    ///
    /// An unknown customer yields an empty sequence rather than an error,
    /// matching the store's history contract.
    pub fn query_history(
        &self,
        ctx: &mut TxContext<'_>,
        customer_id: &str,
    ) -> Result<Vec<HistoryEntry>> {
        self.policy.check(OperationKind::QueryHistory, ctx.caller())?;
        history::reconstruct(&*ctx.world, customer_id)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(AccessPolicy::default())
    }
}

fn require_customer_id(customer_id: &str) -> Result<()> {
    if customer_id.is_empty() {
        return Err(Error::Validation("customer ID cannot be empty".to_string()));
    }
    Ok(())
}

fn require_positive_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::Validation(format!(
            "amount must be a positive integer, got: {}",
            amount
        )));
    }
    Ok(())
}

fn read_account(world: &dyn WorldState, customer_id: &str) -> Result<Option<LoyaltyAccount>> {
    match world.get(customer_id)? {
        Some(bytes) => Ok(Some(LoyaltyAccount::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

fn write_account(world: &mut dyn WorldState, account: &LoyaltyAccount) -> Result<()> {
    world.put(&account.customer_id, account.to_bytes()?)
}
