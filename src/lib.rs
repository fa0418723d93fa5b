//! progenc - transcode job orchestrator
//!
//! Validates encode configurations, compiles them into engine commands,
//! runs one or more encode passes against an external transcoding engine,
//! tracks progress from the engine's log stream, and cancels in-flight work
//! when a newer submission supersedes it.

pub mod config;
pub mod engine;
