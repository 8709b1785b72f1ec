//! Terminal output helpers.

mod output;

pub use output::{error, info, kv, success, warning};
