//! Main ledger orchestration layer
//!
//! Ties together the store, engine, submission actor, and transition log
//! into a high-level API.
//!
//! # Example
//!
//! ```no_run
//! use loyalty_ledger::{ClientIdentity, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> loyalty_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let bank = ClientIdentity::new("BankOrgMSP");
//!     ledger.create_account(bank.clone(), "alice").await?;
//!     ledger.issue_points(bank, "alice", 100, "signup bonus").await?;
//!
//!     Ok(())
//! }
//! ```

use crate::actor::{spawn_ledger_actor, LedgerHandle};
use crate::auth::{AccessPolicy, ClientIdentity};
use crate::engine::Engine;
use crate::events::TransitionLog;
use crate::store::{LedgerStore, RocksStore};
use crate::types::{HistoryEntry, LoyaltyAccount, TransitionRecord};
use crate::{Config, Result};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Main ledger interface
///
/// Owns the submission handle and the transition log; clones of the
/// handle share the single-writer actor, so all operations against one
/// `Ledger` are serialized.
pub struct Ledger {
    /// Actor handle for submitting operations
    handle: LedgerHandle,

    /// Transition event log
    log: TransitionLog,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open a RocksDB-backed ledger with the given configuration
    pub fn open(config: Config) -> Result<Self> {
        let store = Arc::new(RocksStore::open(&config)?);
        Self::with_store(store, config)
    }

    /// Build a ledger over an already-constructed store
    ///
    /// Multiple independent ledgers over independent stores can coexist
    /// in one process; nothing here is a process-wide singleton.
    pub fn with_store<S: LedgerStore>(store: Arc<S>, config: Config) -> Result<Self> {
        let engine = Engine::new(AccessPolicy::issuer_only(config.issuer_msp.clone()));
        let log = TransitionLog::new(config.events.capacity);
        let handle = spawn_ledger_actor(store, engine, log.clone(), config.actor.mailbox_capacity);

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            issuer = %config.issuer_msp,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            log,
            config,
        })
    }

    /// Subscribe to transition records committed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionRecord> {
        self.log.subscribe()
    }

    /// Configuration this ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A cloneable submission handle for this ledger
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Create a new account with zero balance
    pub async fn create_account(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        self.handle.create_account(caller, customer_id).await
    }

    /// Issue points; caller must belong to the issuer organization
    pub async fn issue_points(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        self.handle
            .issue_points(caller, customer_id, amount, description)
            .await
    }

    /// Redeem points
    pub async fn redeem_points(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        self.handle
            .redeem_points(caller, customer_id, amount, description)
            .await
    }

    /// Transfer points between accounts; pass/fail only
    pub async fn transfer_points(
        &self,
        caller: ClientIdentity,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Result<()> {
        self.handle
            .transfer_points(caller, source_id, target_id, amount, description)
            .await
    }

    /// Query current account state
    pub async fn query_account(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
    ) -> Result<LoyaltyAccount> {
        self.handle.query_account(caller, customer_id).await
    }

    /// Query the account's version history, oldest first
    pub async fn query_history(
        &self,
        caller: ClientIdentity,
        customer_id: impl Into<String>,
    ) -> Result<Vec<HistoryEntry>> {
        self.handle.query_history(caller, customer_id).await
    }

    /// Shutdown the ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::TransitionType;
    use crate::Error;

    /// The library never installs a subscriber; tests do, so operation
    /// logs show up in failure output. Idempotent across tests.
    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("loyalty_ledger=debug")
            .with_test_writer()
            .try_init();
    }

    fn bank() -> ClientIdentity {
        ClientIdentity::new("BankOrgMSP")
    }

    fn customer() -> ClientIdentity {
        ClientIdentity::new("CustomerOrgMSP")
    }

    fn create_rocks_ledger() -> (Ledger, tempfile::TempDir) {
        init_test_tracing();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Ledger::open(config).unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn test_ledger_open_and_shutdown() {
        let (ledger, _temp) = create_rocks_ledger();
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rocks_backed_scenario() {
        let (ledger, _temp) = create_rocks_ledger();

        ledger.create_account(customer(), "alice").await.unwrap();
        ledger.create_account(customer(), "bob").await.unwrap();

        ledger
            .issue_points(bank(), "alice", 100, "signup")
            .await
            .unwrap();

        let err = ledger
            .issue_points(customer(), "alice", 10, "sneaky")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "authorization");

        let err = ledger
            .redeem_points(customer(), "alice", 150, "big spend")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));

        ledger
            .redeem_points(customer(), "alice", 40, "coffee")
            .await
            .unwrap();

        ledger
            .transfer_points(customer(), "alice", "bob", 20, "gift")
            .await
            .unwrap();

        let alice = ledger.query_account(customer(), "alice").await.unwrap();
        let bob = ledger.query_account(customer(), "bob").await.unwrap();
        assert_eq!(alice.balance, 40);
        assert_eq!(bob.balance, 20);

        let history = ledger.query_history(customer(), "alice").await.unwrap();
        let balances: Vec<i64> = history.iter().map(|e| e.record.balance).collect();
        assert_eq!(balances, vec![0, 100, 60, 40]);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribers_observe_committed_transitions() {
        let (ledger, _temp) = create_rocks_ledger();
        let mut rx = ledger.subscribe();

        ledger.create_account(customer(), "alice").await.unwrap();
        ledger
            .issue_points(bank(), "alice", 100, "signup")
            .await
            .unwrap();

        let created = rx.recv().await.unwrap();
        assert_eq!(created.transition_type, TransitionType::CreateAccount);
        assert_eq!(created.amount, 0);

        let issued = rx.recv().await.unwrap();
        assert_eq!(issued.transition_type, TransitionType::Issue);
        assert_eq!(issued.amount, 100);
        assert_eq!(issued.customer_id, "alice");

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_independent_ledgers_coexist() {
        init_test_tracing();
        let config = Config::default();
        let ledger_a =
            Ledger::with_store(Arc::new(MemoryStore::new()), config.clone()).unwrap();
        let ledger_b = Ledger::with_store(Arc::new(MemoryStore::new()), config).unwrap();

        ledger_a.create_account(customer(), "alice").await.unwrap();

        // "alice" exists only on ledger A
        let err = ledger_b.query_account(customer(), "alice").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");

        ledger_a.shutdown().await.unwrap();
        ledger_b.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_custom_issuer_org() {
        init_test_tracing();
        let mut config = Config::default();
        config.issuer_msp = "CentralBankMSP".to_string();
        let ledger = Ledger::with_store(Arc::new(MemoryStore::new()), config).unwrap();

        ledger.create_account(customer(), "alice").await.unwrap();

        let err = ledger
            .issue_points(bank(), "alice", 5, "wrong org")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "authorization");

        ledger
            .issue_points(ClientIdentity::new("CentralBankMSP"), "alice", 5, "ok")
            .await
            .unwrap();

        ledger.shutdown().await.unwrap();
    }
}
