//! Core traits and types for cycle-stepped bus and device models.
//!
//! Every component advances on one global clock edge. A step reads the
//! levels driven during the cycle and produces the levels for the next one;
//! nothing is visible half-way through a step.

mod clocked;
mod observable;

pub use clocked::Clocked;
pub use observable::{Observable, Value};
