// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AEGIS Swarm Dashboard Core
//!
//! Control-plane backend for the swarm dashboard: tracks desired and
//! observed state of deployed application instances, reconciles
//! agent-reported reality against stored intent, and broadcasts full
//! snapshots to subscribers.
//!
//! # Architecture
//!
//! - **domain**: aggregates (`Instance`, `Bucket`, `App`), field-group
//!   patches, repository interfaces, agent command contract.
//! - **application**: the reconciler and the lifecycle/bucket/catalog
//!   services.
//! - **infrastructure**: in-memory repositories, notification bus, agent
//!   command channel, HTTP clients.
//! - **presentation**: the HTTP/SSE API surface.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
