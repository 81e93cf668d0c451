//! Memory extraction and the user's memory bank.
//!
//! `extractor` turns message text into scored, tagged memories (remote
//! provider first, keyword rules as fallback). `bank` is the owner-scoped
//! CRUD surface over stored memories.

pub mod bank;
pub mod extractor;
