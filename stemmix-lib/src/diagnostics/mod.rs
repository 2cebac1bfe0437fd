//! Background observers for UI consumers.

pub mod reporter;

pub use reporter::{Report, Reporter};
