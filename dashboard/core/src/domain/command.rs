// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::instance::{AppRelease, InstanceOptions};

/// Instance identity carried on agent commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRef {
    pub name: String,

    #[serde(default)]
    pub options: InstanceOptions,
}

/// One-way command to the swarm agent. Fire-and-forget: no acknowledgement
/// is assumed at this layer; the next agent snapshot confirms the effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentCommand {
    Start {
        app: AppRelease,
        instance: InstanceRef,
    },
    Stop {
        app: AppRelease,
        instance: InstanceRef,
    },
    DeleteBucket {
        name: String,
    },
    CopyBucket {
        source: String,
        destination: String,
    },
}

impl AgentCommand {
    /// Short command label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::DeleteBucket { .. } => "delete_bucket",
            Self::CopyBucket { .. } => "copy_bucket",
        }
    }
}

/// Errors dispatching a command to the agent channel.
///
/// A failed dispatch never rolls back state that was already persisted; the
/// command is lost and must be re-derived by a future reconciliation pass or
/// an external supervisor.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("agent command channel is closed")]
    ChannelClosed,
}

/// One-way message channel to the remote orchestration agent.
pub trait AgentChannel: Send + Sync {
    fn dispatch(&self, command: AgentCommand) -> Result<(), DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serializes_tagged() {
        let command = AgentCommand::DeleteBucket {
            name: "web1".to_string(),
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["type"], "delete_bucket");
        assert_eq!(json["name"], "web1");
    }

    #[test]
    fn test_command_kind() {
        let command = AgentCommand::CopyBucket {
            source: "a".to_string(),
            destination: "b".to_string(),
        };
        assert_eq!(command.kind(), "copy_bucket");
    }
}
