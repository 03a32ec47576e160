pub mod market;
pub mod portfolio;
pub mod errors;

pub use market::*;
pub use portfolio::*;
pub use errors::*;
