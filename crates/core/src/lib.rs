//! Domain logic for the voice-conversion web service.
//!
//! Nothing in this crate knows about HTTP. It owns the job model and its
//! registry, artist model discovery, the subprocess-backed conversion
//! invoker, and the background runner that ties them together.

pub mod conversion;
pub mod error;
pub mod job;
pub mod models;
pub mod registry;
pub mod runner;
pub mod types;
