//! Actor-based transaction submission
//!
//! The engine requires an ordering layer that serializes commits to the
//! same keys. This module is that layer: a single Tokio task owns the
//! store and processes one submitted transaction at a time, so no two
//! invocations ever observe interleaved partial writes.
//!
//! Per transaction the actor assigns a transaction id (UUIDv7, time
//! ordered) and one commit timestamp, runs the engine operation inside a
//! fresh store transaction, commits on success or abandons on failure,
//! and publishes the collected transition records only after the commit
//! lands.

use crate::auth::{ClientIdentity, OperationKind};
use crate::engine::{Engine, TxContext};
use crate::events::TransitionLog;
use crate::metrics::{COMMIT_DURATION, TRANSITIONS_TOTAL};
use crate::store::{LedgerStore, StoreTransaction};
use crate::types::{HistoryEntry, LoyaltyAccount};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Create a new account
    CreateAccount {
        /// Caller identity
        caller: ClientIdentity,
        /// Account key
        customer_id: String,
        /// Result channel
        response: oneshot::Sender<Result<LoyaltyAccount>>,
    },

    /// Issue points to an account
    IssuePoints {
        /// Caller identity
        caller: ClientIdentity,
        /// Account key
        customer_id: String,
        /// Points to add
        amount: i64,
        /// Free-text description
        description: String,
        /// Result channel
        response: oneshot::Sender<Result<LoyaltyAccount>>,
    },

    /// Redeem points from an account
    RedeemPoints {
        /// Caller identity
        caller: ClientIdentity,
        /// Account key
        customer_id: String,
        /// Points to remove
        amount: i64,
        /// Free-text description
        description: String,
        /// Result channel
        response: oneshot::Sender<Result<LoyaltyAccount>>,
    },

    /// Transfer points between two accounts
    TransferPoints {
        /// Caller identity
        caller: ClientIdentity,
        /// Debited account
        source_id: String,
        /// Credited account
        target_id: String,
        /// Points to move
        amount: i64,
        /// Free-text description
        description: String,
        /// Result channel (pass/fail only)
        response: oneshot::Sender<Result<()>>,
    },

    /// Query current account state
    QueryAccount {
        /// Caller identity
        caller: ClientIdentity,
        /// Account key
        customer_id: String,
        /// Result channel
        response: oneshot::Sender<Result<LoyaltyAccount>>,
    },

    /// Query account version history
    QueryHistory {
        /// Caller identity
        caller: ClientIdentity,
        /// Account key
        customer_id: String,
        /// Result channel
        response: oneshot::Sender<Result<Vec<HistoryEntry>>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that executes ledger transactions one at a time
pub struct LedgerActor<S: LedgerStore> {
    store: Arc<S>,
    engine: Engine,
    log: TransitionLog,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl<S: LedgerStore> LedgerActor<S> {
    /// Create new actor
    pub fn new(
        store: Arc<S>,
        engine: Engine,
        log: TransitionLog,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            store,
            engine,
            log,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                other => self.handle_message(other),
            }
        }
        tracing::info!("Ledger actor stopped");
    }

    fn handle_message(&self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::CreateAccount {
                caller,
                customer_id,
                response,
            } => {
                let result = self.execute(OperationKind::CreateAccount, caller, |engine, ctx| {
                    engine.create_account(ctx, &customer_id)
                });
                let _ = response.send(result);
            }

            LedgerMessage::IssuePoints {
                caller,
                customer_id,
                amount,
                description,
                response,
            } => {
                let result = self.execute(OperationKind::IssuePoints, caller, |engine, ctx| {
                    engine.issue_points(ctx, &customer_id, amount, &description)
                });
                let _ = response.send(result);
            }

            LedgerMessage::RedeemPoints {
                caller,
                customer_id,
                amount,
                description,
                response,
            } => {
                let result = self.execute(OperationKind::RedeemPoints, caller, |engine, ctx| {
                    engine.redeem_points(ctx, &customer_id, amount, &description)
                });
                let _ = response.send(result);
            }

            LedgerMessage::TransferPoints {
                caller,
                source_id,
                target_id,
                amount,
                description,
                response,
            } => {
                let result = self.execute(OperationKind::TransferPoints, caller, |engine, ctx| {
                    engine.transfer_points(ctx, &source_id, &target_id, amount, &description)
                });
                let _ = response.send(result);
            }

            LedgerMessage::QueryAccount {
                caller,
                customer_id,
                response,
            } => {
                let result = self.execute(OperationKind::QueryAccount, caller, |engine, ctx| {
                    engine.query_account(ctx, &customer_id)
                });
                let _ = response.send(result);
            }

            LedgerMessage::QueryHistory {
                caller,
                customer_id,
                response,
            } => {
                let result = self.execute(OperationKind::QueryHistory, caller, |engine, ctx| {
                    engine.query_history(ctx, &customer_id)
                });
                let _ = response.send(result);
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Execute one operation as one transaction
    fn execute<T>(
        &self,
        kind: OperationKind,
        caller: ClientIdentity,
        op: impl FnOnce(&Engine, &mut TxContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let tx_id = Uuid::now_v7().to_string();
        let timestamp = Utc::now();

        let result = (|| {
            let mut tx = self.store.begin(&tx_id, timestamp)?;
            let mut ctx = TxContext::new(&mut tx, tx_id.as_str(), timestamp, caller);

            match op(&self.engine, &mut ctx) {
                Ok(value) => {
                    let records = ctx.into_records();
                    tx.commit()?;
                    // Only committed mutations reach subscribers
                    self.log.publish_all(&records);
                    Ok(value)
                }
                Err(err) => {
                    // Dropping the transaction abandons every buffered write
                    Err(err)
                }
            }
        })();

        COMMIT_DURATION
            .with_label_values(&[kind.name()])
            .observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(_) => {
                TRANSITIONS_TOTAL
                    .with_label_values(&[kind.name(), "success"])
                    .inc();
            }
            Err(err) => {
                TRANSITIONS_TOTAL
                    .with_label_values(&[kind.name(), err.kind()])
                    .inc();
                tracing::warn!(operation = kind.name(), tx_id = %tx_id, error = %err, "Operation rejected");
            }
        }

        result
    }
}

/// Handle for submitting operations to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn submit<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Create a new account
    pub async fn create_account(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        let customer_id = customer_id.into();
        self.submit(|response| LedgerMessage::CreateAccount {
            caller,
            customer_id,
            response,
        })
        .await
    }

    /// Issue points to an account
    pub async fn issue_points(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        let customer_id = customer_id.into();
        let description = description.into();
        self.submit(|response| LedgerMessage::IssuePoints {
            caller,
            customer_id,
            amount,
            description,
            response,
        })
        .await
    }

    /// Redeem points from an account
    pub async fn redeem_points(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        let customer_id = customer_id.into();
        let description = description.into();
        self.submit(|response| LedgerMessage::RedeemPoints {
            caller,
            customer_id,
            amount,
            description,
            response,
        })
        .await
    }

    /// Transfer points between two accounts
    pub async fn transfer_points(
        &self,
        caller: ClientIdentity,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Result<()> {
        let source_id = source_id.into();
        let target_id = target_id.into();
        let description = description.into();
        self.submit(|response| LedgerMessage::TransferPoints {
            caller,
            source_id,
            target_id,
            amount,
            description,
            response,
        })
        .await
    }

    /// Query current account state
    pub async fn query_account(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        let customer_id = customer_id.into();
        self.submit(|response| LedgerMessage::QueryAccount {
            caller,
            customer_id,
            response,
        })
        .await
    }

    /// Query account version history
    pub async fn query_history(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
    ) -> Result<Vec<HistoryEntry>> {
        let customer_id = customer_id.into();
        self.submit(|response| LedgerMessage::QueryHistory {
            caller,
            customer_id,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor<S: LedgerStore>(
    store: Arc<S>,
    engine: Engine,
    log: TransitionLog,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded for backpressure
    let actor = LedgerActor::new(store, engine, log, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
