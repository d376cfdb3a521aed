pub mod notices;
pub mod payment;

pub use notices::*;
pub use payment::*;
