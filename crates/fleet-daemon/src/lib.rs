//! Background daemon for the beads fleet pipeline.
//!
//! Wires the tracker, the agent slot and the orchestrator together and
//! serves the fleet HTTP API until shutdown.

pub mod daemon;
pub mod shutdown;
