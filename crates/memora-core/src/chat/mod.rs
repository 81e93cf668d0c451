//! Conversations and the session governor.
//!
//! `session` classifies message counts against the soft/hard thresholds,
//! `governor` serializes sends and performs rollover, `summarizer` writes
//! the rollover summary, and `service` covers conversation lifecycle.
//! `locks` is the per-conversation lock registry the last two share.

pub mod governor;
pub mod locks;
pub mod service;
pub mod session;
pub mod summarizer;
