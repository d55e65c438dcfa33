//! Global allocator.
//!
//! Lookups allocate many short-lived buffers (response bodies, hash chunks,
//! JSON trees); mimalloc handles that pattern better than the system allocator.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
