// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Durable state for quotas, blocks and cached captions
//!
//! The coordinator only talks to `PersistentStore`. `MemoryStore` is the
//! bundled implementation; it keeps each collection behind its own lock and
//! can snapshot itself to a JSON file for restarts.

pub mod backend;
pub mod memory;

pub use backend::{PersistentStore, StoreError};
pub use memory::MemoryStore;
