pub mod converge;

pub use converge::*;
