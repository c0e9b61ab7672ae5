//! Allocation-storm harness for brickalloc.
//!
//! This crate provides:
//! - Deterministic storms: seeded allocate/deallocate sequences in several
//!   shapes (sawtooth, random churn, LIFO bursts, mixed sizes)
//! - Subjects: free-list, stack and segregated trees, each with an audit
//!   hook that checks the tree's invariants against the live set
//! - Reports: machine-readable JSON summaries of each run

pub mod rng;
pub mod storm;
pub mod subject;

pub use rng::XorShift64;
pub use storm::{Scenario, StormConfig, StormError, StormReport, run_storm};
pub use subject::{AllocatorKind, FitChoice, StormSubject};
