//! Session store
//!
//! An actor task owns every session; callers talk to it through the cloneable
//! [`SessionStore`] handle. All access is serialized by the actor.

mod manager;
mod messages;

pub use manager::SessionStore;
pub use messages::{SessionCommand, StoreError, StoreResponse};
