// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Bucket Application Service
//!
//! Bucket delete and copy follow the same mark-then-dispatch pattern as
//! instance mutations: the affected buckets are locked in the store before
//! the command leaves for the agent, so the asynchronous external copy or
//! delete never races a concurrent mutation. Unlocking is the external
//! worker's job.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::bucket::Bucket;
use crate::domain::command::{AgentChannel, AgentCommand, DispatchError};
use crate::domain::repository::{BucketRepository, RepositoryError};
use crate::infrastructure::event_bus::NotificationBus;

#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error("Bucket {0} does not exist")]
    BucketNotFound(String),

    #[error("Bucket {0} already exists")]
    BucketExists(String),

    #[error("bucket store error: {0}")]
    Store(RepositoryError),

    #[error("agent dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl From<RepositoryError> for BucketError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::AlreadyExists(name) => Self::BucketExists(name),
            other => Self::Store(other),
        }
    }
}

#[async_trait]
pub trait BucketService: Send + Sync {
    /// All buckets, ordered by name.
    async fn list_buckets(&self) -> Result<Vec<Bucket>, BucketError>;

    /// Lock the bucket and request its deletion. The record itself is not
    /// removed here; the external worker owns removal.
    async fn delete_bucket(&self, name: &str) -> Result<(), BucketError>;

    /// Lock the source, create a locked destination, and request the copy.
    /// Returns the destination record immediately; the data copy is
    /// asynchronous.
    async fn copy_bucket(&self, source: &str, destination: &str) -> Result<Bucket, BucketError>;
}

pub struct StandardBucketService {
    buckets: Arc<dyn BucketRepository>,
    agent: Arc<dyn AgentChannel>,
    bus: Arc<NotificationBus>,
}

impl StandardBucketService {
    pub fn new(
        buckets: Arc<dyn BucketRepository>,
        agent: Arc<dyn AgentChannel>,
        bus: Arc<NotificationBus>,
    ) -> Self {
        Self {
            buckets,
            agent,
            bus,
        }
    }

    async fn publish_buckets(&self) {
        match self.buckets.list_all().await {
            Ok(all) => self.bus.publish_buckets(all),
            Err(e) => warn!(error = %e, "Failed to re-read buckets for snapshot publish"),
        }
    }
}

#[async_trait]
impl BucketService for StandardBucketService {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, BucketError> {
        Ok(self.buckets.list_all().await?)
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), BucketError> {
        self.buckets
            .set_locked(name, true)
            .await?
            .ok_or_else(|| BucketError::BucketNotFound(name.to_string()))?;

        info!(%name, "Bucket delete requested");
        self.publish_buckets().await;

        self.agent.dispatch(AgentCommand::DeleteBucket {
            name: name.to_string(),
        })?;

        Ok(())
    }

    async fn copy_bucket(&self, source: &str, destination: &str) -> Result<Bucket, BucketError> {
        // Both ends must be locked before the copy command leaves.
        self.buckets
            .set_locked(source, true)
            .await?
            .ok_or_else(|| BucketError::BucketNotFound(source.to_string()))?;

        let created = self.buckets.insert(Bucket::locked(destination)).await?;

        info!(%source, %destination, "Bucket copy requested");

        self.agent.dispatch(AgentCommand::CopyBucket {
            source: source.to_string(),
            destination: destination.to_string(),
        })?;

        self.publish_buckets().await;

        Ok(created)
    }
}
