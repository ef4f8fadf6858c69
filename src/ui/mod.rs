//! Line-oriented terminal interface.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop
//! - `input` - Command parsing and handling
//! - `events` - Background event processing
//! - `render` - Text formatting for lists, details and tags

mod events;
mod input;
mod loop_runner;
mod render;

pub use input::{parse_input, Input};
pub use loop_runner::{run, Action};
pub use render::{format_detail, format_published, format_row, render_list};
