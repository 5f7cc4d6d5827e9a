//! Transition event log
//!
//! One structured record per committed mutation, fanned out to however
//! many subscribers are listening. Records for a failed or abandoned
//! transaction are never published; the submission layer publishes only
//! after the store commit succeeds.

use crate::metrics::EVENTS_PUBLISHED_TOTAL;
use crate::types::TransitionRecord;
use tokio::sync::broadcast;

/// Broadcast log of committed transition records
///
/// Cloning shares the underlying channel. Subscribers that fall behind
/// the channel capacity lose the oldest records (`RecvError::Lagged`),
/// which is the usual broadcast trade-off; auditors needing a complete
/// trail should reconstruct from the store's history instead.
#[derive(Debug, Clone)]
pub struct TransitionLog {
    sender: broadcast::Sender<TransitionRecord>,
}

impl TransitionLog {
    /// Create a log retaining up to `capacity` unconsumed records per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to records published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionRecord> {
        self.sender.subscribe()
    }

    /// Publish one committed record
    pub fn publish(&self, record: &TransitionRecord) {
        tracing::debug!(
            event = record.transition_type.event_name(),
            transaction_id = %record.transaction_id,
            customer_id = %record.customer_id,
            amount = record.amount,
            "Transition committed"
        );

        EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[record.transition_type.event_name()])
            .inc();

        // No subscribers is fine; the record was still logged above
        let _ = self.sender.send(record.clone());
    }

    /// Publish every record of one committed transaction, in emission order
    pub fn publish_all(&self, records: &[TransitionRecord]) {
        for record in records {
            self.publish(record);
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransitionType;
    use chrono::Utc;

    fn record(tx_id: &str, transition_type: TransitionType, amount: i64) -> TransitionRecord {
        TransitionRecord {
            transaction_id: tx_id.to_string(),
            customer_id: "alice".to_string(),
            transition_type,
            amount,
            timestamp: Utc::now(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let log = TransitionLog::new(16);
        let mut rx = log.subscribe();

        log.publish_all(&[
            record("tx-1", TransitionType::TransferOut, 20),
            record("tx-1", TransitionType::TransferIn, 20),
        ]);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.transition_type, TransitionType::TransferOut);
        assert_eq!(second.transition_type, TransitionType::TransferIn);
        assert_eq!(first.transaction_id, second.transaction_id);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_fail() {
        let log = TransitionLog::new(16);
        assert_eq!(log.subscriber_count(), 0);
        log.publish(&record("tx-1", TransitionType::Issue, 100));
    }
}
