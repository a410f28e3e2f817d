//! Last-write-wins conflict resolution.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::models::{Achievement, DeviceStats, VisitLog, VisitLogId};

/// An entity that can be reconciled by comparing a single timestamp.
pub trait LastWriteWins {
    type Key: Eq + Hash + Clone;

    /// Identity used to pair a local entity with its remote counterpart.
    /// `None` means the entity has never been assigned one.
    fn merge_key(&self) -> Option<Self::Key>;

    /// Timestamp compared during resolution. Strictly newer wins.
    fn tiebreaker(&self) -> DateTime<Utc>;
}

impl LastWriteWins for VisitLog {
    type Key = VisitLogId;

    fn merge_key(&self) -> Option<Self::Key> {
        self.id
    }

    fn tiebreaker(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl LastWriteWins for Achievement {
    type Key = String;

    fn merge_key(&self) -> Option<Self::Key> {
        Some(self.achievement_key.clone())
    }

    fn tiebreaker(&self) -> DateTime<Utc> {
        self.unlocked_at
    }
}

impl LastWriteWins for DeviceStats {
    type Key = ();

    fn merge_key(&self) -> Option<Self::Key> {
        Some(())
    }

    fn tiebreaker(&self) -> DateTime<Utc> {
        self.last_log_date.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Pick the winner of a single conflict. Ties keep the local version.
pub fn resolve<T: LastWriteWins>(local: T, remote: T) -> T {
    if remote.tiebreaker() > local.tiebreaker() {
        remote
    } else {
        local
    }
}

/// Fold `remote` into the keyed `local` map.
///
/// Remote-only entities are inserted, shared keys go to the strictly newer
/// timestamp, and local-only entities are kept. Remote entities without an
/// identity cannot be paired and are skipped.
pub fn merge<T, I>(mut local: HashMap<T::Key, T>, remote: I) -> HashMap<T::Key, T>
where
    T: LastWriteWins,
    I: IntoIterator<Item = T>,
{
    for incoming in remote {
        let Some(key) = incoming.merge_key() else {
            tracing::debug!("Skipping remote entity without identity");
            continue;
        };
        match local.entry(key) {
            Entry::Occupied(mut existing) => {
                if incoming.tiebreaker() > existing.get().tiebreaker() {
                    existing.insert(incoming);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
        }
    }
    local
}

/// Merge two flat collections.
///
/// Local entities without an identity have nothing to conflict with and are
/// carried through unchanged.
pub fn merge_collections<T: LastWriteWins>(local: Vec<T>, remote: Vec<T>) -> Vec<T> {
    let mut keyed = HashMap::with_capacity(local.len());
    let mut unkeyed = Vec::new();

    for item in local {
        match item.merge_key() {
            Some(key) => match keyed.remove(&key) {
                Some(previous) => {
                    keyed.insert(key, resolve(previous, item));
                }
                None => {
                    keyed.insert(key, item);
                }
            },
            None => unkeyed.push(item),
        }
    }

    let mut merged: Vec<T> = merge(keyed, remote).into_values().collect();
    merged.extend(unkeyed);
    merged
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::Rating;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn log_at(updated_at: DateTime<Utc>) -> VisitLog {
        let mut log = VisitLog::new(180, Rating::Great, 4);
        log.updated_at = updated_at;
        log
    }

    fn sorted(mut logs: Vec<VisitLog>) -> Vec<VisitLog> {
        logs.sort_by_key(|log| (log.id.map(|id| id.as_str()), log.updated_at));
        logs
    }

    #[test]
    fn newer_remote_wins() {
        let local = log_at(at(0));
        let mut remote = local.clone();
        remote.updated_at = at(10);
        remote.notes = Some("edited elsewhere".to_string());

        assert_eq!(resolve(local, remote.clone()), remote);
    }

    #[test]
    fn newer_local_wins() {
        let local = log_at(at(10));
        let mut remote = local.clone();
        remote.updated_at = at(0);
        remote.duration_seconds = 60;

        assert_eq!(resolve(local.clone(), remote), local);
    }

    #[test]
    fn equal_timestamps_keep_local() {
        let local = log_at(at(5));
        let mut remote = local.clone();
        remote.notes = Some("same instant".to_string());

        assert_eq!(resolve(local.clone(), remote), local);
    }

    #[test]
    fn remote_only_entities_are_inserted_and_local_only_kept() {
        let local_only = log_at(at(0));
        let remote_only = log_at(at(1));

        let merged = merge_collections(vec![local_only.clone()], vec![remote_only.clone()]);

        assert_eq!(sorted(merged), sorted(vec![local_only, remote_only]));
    }

    #[test]
    fn merge_is_idempotent() {
        let shared = log_at(at(0));
        let mut newer_remote = shared.clone();
        newer_remote.updated_at = at(30);
        let local = vec![shared, log_at(at(3))];
        let remote = vec![newer_remote, log_at(at(7))];

        let once = merge_collections(local, remote.clone());
        let twice = merge_collections(once.clone(), remote);

        assert_eq!(sorted(twice), sorted(once));
    }

    #[test]
    fn local_entities_without_identity_are_carried_through() {
        let mut legacy = log_at(at(0));
        legacy.id = None;
        let remote = log_at(at(1));

        let merged = merge_collections(vec![legacy.clone()], vec![remote.clone()]);

        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&legacy));
        assert!(merged.contains(&remote));
    }

    #[test]
    fn remote_entities_without_identity_are_skipped() {
        let mut anonymous = log_at(at(0));
        anonymous.id = None;

        let merged = merge_collections(Vec::new(), vec![anonymous]);

        assert!(merged.is_empty());
    }

    #[test]
    fn achievements_pair_by_key() {
        let local = Achievement::unlock("streak_7").unwrap();
        let mut remote = Achievement::unlock("streak_7").unwrap();
        remote.unlocked_at = local.unlocked_at + Duration::hours(1);
        remote.is_viewed = true;

        let merged = merge_collections(vec![local], vec![remote.clone()]);

        assert_eq!(merged, vec![remote]);
    }

    #[test]
    fn device_stats_without_log_date_lose_to_any_dated_copy() {
        let local = DeviceStats::default();
        let remote = DeviceStats {
            streak_count: 3,
            total_flush_funds: 40,
            total_logs: 4,
            last_log_date: Some(at(0)),
        };

        assert_eq!(resolve(local, remote.clone()), remote);
    }
}
