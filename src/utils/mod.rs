// Utilities shared by the facade and adapters

pub mod results;

pub use results::*;
