//! History reconstruction
//!
//! Replays a key's version log into an ordered sequence of account
//! snapshots. Order is the store's commit order; this module never
//! re-sorts. Read-only and idempotent.

use crate::store::WorldState;
use crate::types::{HistoryEntry, LoyaltyAccount};
use crate::Result;

/// Drain the version history of `customer_id` into ordered
/// [`HistoryEntry`] values, oldest first.
///
/// Delete markers are skipped. This engine never deletes accounts, but the
/// store contract allows them, so the filter stays.
pub fn reconstruct(world: &dyn WorldState, customer_id: &str) -> Result<Vec<HistoryEntry>> {
    let mut entries = Vec::new();

    for version in world.get_history(customer_id)? {
        let version = version?;
        if version.is_delete {
            continue;
        }

        let record = LoyaltyAccount::from_bytes(&version.value)?;
        entries.push(HistoryEntry {
            record,
            tx_id: version.tx_id,
            timestamp: version.timestamp,
            is_delete: version.is_delete,
        });
    }

    Ok(entries)
}
