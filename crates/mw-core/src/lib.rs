//! memory-wall/crates/mw-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the memory wall:
//! entries, the upload pipeline, the live feed and moderation rules.

pub mod clock;
pub mod error;
pub mod feed;
pub mod models;
pub mod moderation;
pub mod pipeline;
pub mod probe;
pub mod settings;
pub mod traits;
pub mod validator;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use models::*;
pub use settings::GuestbookSettings;
pub use traits::*;
