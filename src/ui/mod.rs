//! User interface components for terminal interaction.
//!
//! # Modules
//!
//! - [`display`]: Colored scan results and status lines
//! - [`prompt`]: Password dialogs for storing and unlocking the API key

pub mod display;
pub mod prompt;

pub use display::{show_info, show_report, show_success};
