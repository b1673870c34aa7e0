//! Worker system: one polling loop per running agent.

pub mod poll_loop;

pub use poll_loop::{WorkerContext, WorkerExit, WorkerSettings, run_worker};
