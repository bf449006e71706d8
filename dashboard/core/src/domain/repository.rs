// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root, following the DDD
//! Repository pattern: one repository per aggregate, interface defined in the
//! domain layer, implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `InstanceRepository` | `Instance` | `InMemoryInstanceRepository` |
//! | `BucketRepository` | `Bucket` | `InMemoryBucketRepository` |
//! | `AppRepository` | `App` | `InMemoryAppRepository` |
//!
//! ## Writer Discipline
//!
//! `InstanceRepository` deliberately has no whole-record update. The
//! reconciler writes through [`apply_observed`](InstanceRepository::apply_observed)
//! and the lifecycle controller through
//! [`apply_desired`](InstanceRepository::apply_desired); each path touches
//! only its own field group, so concurrent mutation and reconciliation cannot
//! clobber each other regardless of interleaving.

use async_trait::async_trait;

use crate::domain::app::{App, AppKey};
use crate::domain::bucket::Bucket;
use crate::domain::instance::{
    DesiredPatch, Instance, InstanceFilter, ObservedPatch,
};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Store error: {0}")]
    Store(String),
}

/// Repository interface for Instance aggregates
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if the name is taken.
    async fn insert(&self, instance: Instance) -> Result<Instance, RepositoryError>;

    /// All records matching the filter, ordered by name.
    async fn find_all(&self, filter: InstanceFilter) -> Result<Vec<Instance>, RepositoryError>;

    /// Upsert the observed field group (reconciler-only path). Creates the
    /// record defensively when no record with this name exists.
    async fn apply_observed(
        &self,
        name: &str,
        patch: ObservedPatch,
    ) -> Result<Instance, RepositoryError>;

    /// Update the desired field group (controller-only path). Returns `None`
    /// when no record matches; never creates.
    async fn apply_desired(
        &self,
        name: &str,
        patch: DesiredPatch,
    ) -> Result<Option<Instance>, RepositoryError>;

    /// Delete every record matching the filter, returning the count removed.
    async fn remove_where(&self, filter: InstanceFilter) -> Result<usize, RepositoryError>;
}

/// Repository interface for Bucket aggregates
#[async_trait]
pub trait BucketRepository: Send + Sync {
    /// Insert a new bucket. Fails with `AlreadyExists` if the name is taken.
    async fn insert(&self, bucket: Bucket) -> Result<Bucket, RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Bucket>, RepositoryError>;

    /// All buckets, ordered by name.
    async fn list_all(&self) -> Result<Vec<Bucket>, RepositoryError>;

    /// Set the lock flag, returning the updated bucket or `None` when absent.
    async fn set_locked(
        &self,
        name: &str,
        locked: bool,
    ) -> Result<Option<Bucket>, RepositoryError>;
}

/// Repository interface for App aggregates
#[async_trait]
pub trait AppRepository: Send + Sync {
    /// Insert or replace the app matching (`name`, `version`). An existing
    /// record keeps its id and creation time.
    async fn upsert(&self, app: App) -> Result<App, RepositoryError>;

    async fn find_by_key(&self, key: &AppKey) -> Result<Option<App>, RepositoryError>;

    /// All apps, ordered by (name, version).
    async fn list_all(&self) -> Result<Vec<App>, RepositoryError>;

    /// Remove the app matching the key, returning the count removed.
    async fn remove(&self, key: &AppKey) -> Result<usize, RepositoryError>;
}
