//! Domain models for the nutri-plan system.

mod account;
mod publication;
mod report;
mod session;

pub use account::*;
pub use publication::*;
pub use report::*;
pub use session::*;
