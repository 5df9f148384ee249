//! Tutoring stage state machine
//!
//! Pure stage transitions plus a small stateful tracker per live session.

mod mcq;
pub mod state;
pub(crate) mod tracker;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use mcq::looks_like_multiple_choice;
pub use state::SessionState;
pub use tracker::StageTracker;
pub use transition::{advance, TransitionResult};
