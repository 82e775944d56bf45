//! Cart domain module.
//!
//! This crate contains the per-(customer, product) cart line state machine,
//! implemented purely as deterministic domain logic (no IO, no storage).

pub mod line;

pub use line::{LineState, LineWrite};
