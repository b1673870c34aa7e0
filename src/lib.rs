//! Bot fleet: supervises a set of independent score-polling agents.

pub mod agent;
pub mod config;
pub mod console;
pub mod definitions;
pub mod error;
pub mod poll;
pub mod supervisor;
pub mod worker;
