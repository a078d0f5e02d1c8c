//! Command protocol: report layouts and burst bookkeeping.

pub mod burst;
pub mod wire;
