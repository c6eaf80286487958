pub mod macros;
pub mod overtime;

pub use overtime::*;
