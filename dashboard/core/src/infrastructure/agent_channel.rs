// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::command::{AgentChannel, AgentCommand, DispatchError};

/// In-process agent command channel over an unbounded mpsc queue.
///
/// The dashboard only ever enqueues; the receiver half belongs to whatever
/// transport bridges commands to the swarm agent. Dispatch is fire-and-forget
/// and fails only when the receiver half has been dropped.
pub struct AgentCommandSender {
    sender: mpsc::UnboundedSender<AgentCommand>,
}

impl AgentCommandSender {
    /// Create the channel, returning the dispatch half and the receiver half
    /// for the transport bridge.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl AgentChannel for AgentCommandSender {
    fn dispatch(&self, command: AgentCommand) -> Result<(), DispatchError> {
        debug!(kind = command.kind(), "Dispatching agent command");
        self.sender
            .send(command)
            .map_err(|_| DispatchError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_delivers_command() {
        let (channel, mut receiver) = AgentCommandSender::channel();
        channel
            .dispatch(AgentCommand::DeleteBucket {
                name: "web1".to_string(),
            })
            .unwrap();

        let command = receiver.recv().await.unwrap();
        assert_eq!(command.kind(), "delete_bucket");
    }

    #[tokio::test]
    async fn test_dispatch_fails_when_receiver_dropped() {
        let (channel, receiver) = AgentCommandSender::channel();
        drop(receiver);

        let err = channel
            .dispatch(AgentCommand::DeleteBucket {
                name: "web1".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::ChannelClosed));
    }
}
