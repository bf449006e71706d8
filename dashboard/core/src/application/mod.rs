// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod buckets;
pub mod catalog;
pub mod lifecycle;
pub mod reconciler;

pub use buckets::{BucketService, StandardBucketService};
pub use catalog::{AppCatalogService, StandardAppCatalogService};
pub use lifecycle::{InstanceLifecycleService, StandardInstanceLifecycleService};
pub use reconciler::{ReconcileStats, Reconciler};
