// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_channel;
pub mod appstore;
pub mod event_bus;
pub mod logs;
pub mod repositories;
