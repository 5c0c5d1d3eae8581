//! Shared utilities: input validation.

pub mod validation;

pub use validation::{validate_az_count, validate_name, validate_prefix_range, validate_region};
