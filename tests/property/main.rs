//! Property tests for the join sampling frameworks.
//!
//! Run with: `cargo test --test property`

mod oracle_equivalence;
mod partition;
mod sampling;
mod strategies;
