//! # Deferred Mutation Primitives
//!
//! Worker threads never touch pool structure directly during an update phase.
//! They post value-type commands instead, and exactly one thread drains them
//! at the sync point between phases.
//!
//! ```text
//! Phase N (parallel):
//!   worker A ──post(destroy e7)──┐
//!   worker B ──post(create  t2)──┼──▶ Mailbox (lock-free, unbounded)
//!   worker C ──post(destroy e9)──┘
//!
//! Sync (single thread):
//!   registry.sync() ── drain ──▶ apply in arrival order
//! ```

mod mailbox;

pub use mailbox::Mailbox;
