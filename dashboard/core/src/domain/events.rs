// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::app::App;
use crate::domain::bucket::Bucket;
use crate::domain::instance::Instance;

/// Notification topics carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Instances,
    Buckets,
    Apps,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instances => "instances",
            Self::Buckets => "buckets",
            Self::Apps => "apps",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot notification published to dashboard subscribers.
///
/// Every payload is a full replacement of the topic's collection, not a
/// diff: a subscriber that misses an event recovers completely on the next
/// publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "lowercase")]
pub enum Notification {
    Instances(Vec<Instance>),
    Buckets(Vec<Bucket>),
    Apps(Vec<App>),
}

impl Notification {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Instances(_) => Topic::Instances,
            Self::Buckets(_) => Topic::Buckets,
            Self::Apps(_) => Topic::Apps,
        }
    }
}
