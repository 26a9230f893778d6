//! Account import and export.

mod accounts;

pub use accounts::*;
