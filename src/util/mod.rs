//! Utility functions for common operations.
//!
//! - **URL validation**: endpoint and browser-link checks
//! - **Text processing**: Unicode-aware width, truncation and terminal sanitising

mod text;
mod url_validator;

pub use text::{display_width, single_line, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_endpoint, validate_url_for_open, UrlValidationError};
