//! Tests for closed user groups against a live store.
//!
//! Organized by functionality:
//! - Index maintenance on commit (additions, removals, moves, self-healing)
//! - Nested read evaluation
//! - Property-based index consistency

mod fixtures;

#[cfg(test)]
mod evaluator_tests;
