// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique record identifier for a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketId(pub Uuid);

impl BucketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BucketId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BucketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage bucket record, keyed by `name`.
///
/// Both delete and copy follow the mark-then-dispatch pattern: the bucket is
/// locked before the command goes out, so the asynchronous external worker
/// operates on a bucket no one else may mutate. Unlocking (and removal, for
/// deletes) is that worker's responsibility, not the dashboard's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub id: BucketId,
    pub name: String,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bucket {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: BucketId::new(),
            name: name.into(),
            is_locked: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// A bucket born locked, for copy destinations.
    pub fn locked(name: impl Into<String>) -> Self {
        let mut bucket = Self::new(name);
        bucket.is_locked = true;
        bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bucket_unlocked() {
        let bucket = Bucket::new("web1");
        assert_eq!(bucket.name, "web1");
        assert!(!bucket.is_locked);
    }

    #[test]
    fn test_locked_bucket() {
        assert!(Bucket::locked("web1-copy").is_locked);
    }
}
