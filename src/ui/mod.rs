//! Terminal output and prompts
//!
//! Uses `cliclack` for interactive prompts and step output, with automatic
//! fallback to plain output in CI/non-interactive environments.

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{remark, step_ok, step_ok_detail, step_warn_hint};
pub use prompts::confirm;
