pub mod cli;
pub mod controller;
pub mod offer;

pub use cli::*;
pub use controller::*;
