//! Backends for the pending-content handoff.

pub mod backends;

pub use backends::*;

pub mod prelude {
    pub use super::backends::*;
    pub use rp_core::{PendingContent, PendingStore};
}
