// crates/core/src/lib.rs
pub mod artifact;
pub mod calendar;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod paths;
pub mod source;
pub mod types;

pub use artifact::*;
pub use calendar::*;
pub use error::*;
pub use ingest::*;
pub use source::*;
pub use types::*;
