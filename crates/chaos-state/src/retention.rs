//! Retention policies for pruning old result records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::ResultId;

/// Policy controlling which results are eligible for eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Remove results completed more than this many seconds ago.
    pub max_age_secs: Option<u64>,
    /// Keep at most this many results (oldest removed first).
    pub max_results: Option<usize>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_secs: Some(30 * 24 * 60 * 60),
            max_results: Some(10_000),
        }
    }
}

impl RetentionPolicy {
    /// A policy that never evicts anything.
    pub fn keep_all() -> Self {
        Self {
            max_age_secs: None,
            max_results: None,
        }
    }

    /// Select the ids to evict from `entries`, which must be given in
    /// insertion order. Applied in order:
    /// 1. Older than max age
    /// 2. Excess entries beyond max count (oldest first)
    pub fn select_expired<I>(&self, entries: I, now: DateTime<Utc>) -> Vec<ResultId>
    where
        I: IntoIterator<Item = (ResultId, DateTime<Utc>)>,
    {
        let mut kept: Vec<(ResultId, DateTime<Utc>)> = Vec::new();
        let mut expired = Vec::new();

        // An age too large to represent means nothing is old enough.
        let cutoff = self.max_age_secs.and_then(|secs| {
            let secs = i64::try_from(secs).ok()?;
            chrono::Duration::try_seconds(secs).and_then(|age| now.checked_sub_signed(age))
        });

        for (id, completed_at) in entries {
            match cutoff {
                Some(cutoff) if completed_at < cutoff => expired.push(id),
                _ => kept.push((id, completed_at)),
            }
        }

        if let Some(max) = self.max_results {
            if kept.len() > max {
                let excess = kept.len() - max;
                // Stable sort keeps insertion order among equal timestamps.
                kept.sort_by_key(|(_, completed_at)| *completed_at);
                expired.extend(kept.iter().take(excess).map(|(id, _)| *id));
            }
        }

        expired
    }
}

/// Outcome of a retention pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub removed_ids: Vec<ResultId>,
    pub remaining_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::seconds(secs_ago)
    }

    #[test]
    fn test_keep_all_never_evicts() {
        let now = Utc::now();
        let entries = vec![(ResultId::new(), at(1_000_000, now))];
        assert!(RetentionPolicy::keep_all()
            .select_expired(entries, now)
            .is_empty());
    }

    #[test]
    fn test_max_age_evicts_old_entries() {
        let now = Utc::now();
        let old = ResultId::new();
        let fresh = ResultId::new();
        let policy = RetentionPolicy {
            max_age_secs: Some(60),
            max_results: None,
        };

        let expired = policy.select_expired(vec![(old, at(120, now)), (fresh, at(10, now))], now);
        assert_eq!(expired, vec![old]);
    }

    #[test]
    fn test_max_results_evicts_oldest_first() {
        let now = Utc::now();
        let ids: Vec<ResultId> = (0..4).map(|_| ResultId::new()).collect();
        let entries = vec![
            (ids[0], at(40, now)),
            (ids[1], at(30, now)),
            (ids[2], at(20, now)),
            (ids[3], at(10, now)),
        ];
        let policy = RetentionPolicy {
            max_age_secs: None,
            max_results: Some(2),
        };

        let expired = policy.select_expired(entries, now);
        assert_eq!(expired, vec![ids[0], ids[1]]);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.max_age_secs, Some(2_592_000));
        assert_eq!(policy.max_results, Some(10_000));
    }
}
