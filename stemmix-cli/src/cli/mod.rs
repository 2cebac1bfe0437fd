pub mod args;
pub mod params;
