//! Agent records: the per-bot state owned by the supervisor.

pub mod record;

pub use record::{AgentId, AgentSlot, AgentSnapshot, AgentStatus, Credentials};
