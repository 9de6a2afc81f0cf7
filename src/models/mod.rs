//! Data models for the Corbii server.

mod purge;
mod record;
mod sync_marker;

pub use purge::*;
pub use record::*;
pub use sync_marker::*;
