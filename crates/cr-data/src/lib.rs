//! Price-history providers and return-table assembly.

pub mod fetcher;
pub mod http;
pub mod providers;
pub mod sources;
pub mod symbols;

pub use fetcher::*;
pub use http::*;
pub use providers::*;
pub use sources::*;
pub use symbols::*;
