//! Record store abstractions for Memora.
//!
//! This module defines the `RecordStore` trait that the infrastructure
//! layer implements, the write-batch types used for atomic multi-record
//! operations, and an in-process store for embedding and tests.

pub mod batch;
pub mod in_memory;
pub mod repository;
pub mod stats;
