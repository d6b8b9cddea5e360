pub mod generation;
pub mod health;
pub mod sse;

pub use generation::*;
pub use health::*;
