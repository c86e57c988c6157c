//! Trait for components that advance one clock edge at a time.

/// A synchronous component advanced by a single discrete step per tick.
///
/// `step` is a total function from (current state, inputs) to (next state,
/// outputs). Implementations must update every register they own in one
/// call so that callers never observe a partially applied edge.
pub trait Clocked {
    /// Levels sampled by the component during the cycle.
    type Inputs;
    /// Levels the component drives during the next cycle.
    type Outputs;

    /// Advance by one clock edge.
    fn step(&mut self, inputs: &Self::Inputs) -> Self::Outputs;

    /// Return to the power-on state.
    fn reset(&mut self);
}
