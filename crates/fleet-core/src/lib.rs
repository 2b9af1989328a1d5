//! Core data model and collaborator seams for the beads fleet pipeline.
//!
//! - [`types`]: epics, label vocabulary, derived pipeline stage, QA rounds
//! - [`app_name`]: short per-app identifier derived from an epic title
//! - [`config`]: TOML configuration
//! - [`cache`]: TTL read cache shared with the tracker
//! - [`tracker`]: label store / issue repository traits and the `bd` CLI backend

pub mod app_name;
pub mod cache;
pub mod config;
pub mod tracker;
pub mod types;
