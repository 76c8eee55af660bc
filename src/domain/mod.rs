pub mod action;
pub mod decision;
pub mod market;
pub mod mode;

pub use action::*;
pub use decision::*;
pub use market::*;
pub use mode::*;
