pub mod business;
pub mod contact;
pub mod diagnostics;
pub mod locator;
pub mod progress;
pub mod stats;

pub use business::*;
pub use contact::*;
pub use diagnostics::*;
pub use progress::*;
pub use stats::*;
