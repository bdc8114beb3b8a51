pub mod calculator;
pub mod indicators;


pub use calculator::*;
pub use indicators::*;
