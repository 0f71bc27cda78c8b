pub mod controller;
pub mod generator;

pub use controller::*;
pub use generator::*;
