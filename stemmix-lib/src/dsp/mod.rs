//! Per-buffer effect processing.

mod chain;
mod params;

pub use chain::process_chunk;
pub use params::{EffectParameters, EqUpdate};

pub(crate) use params::SharedParams;
