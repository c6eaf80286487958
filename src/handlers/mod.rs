pub mod overtime;
pub mod shared;
