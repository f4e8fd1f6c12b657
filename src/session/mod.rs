//! Session core.
//!
//! This module provides the per-request session store and its supporting
//! types: the validated session id and the dotted-key attribute mapping
//! the store serializes through its handler.

mod attributes;
mod id;
mod store;

pub use attributes::AttributeMap;
pub use id::{InvalidSessionId, SessionId, ID_LENGTH};
pub use store::Store;
