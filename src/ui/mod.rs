//! Terminal output helpers
//!
//! Spinners render with `indicatif` on stderr when attached to a terminal,
//! and degrade to plain tagged lines in CI.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_ok, step_warn, step_warn_hint};
pub use progress::TaskSpinner;
