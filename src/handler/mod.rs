//! Session persistence handlers.
//!
//! A handler durably stores the opaque serialized attribute blob of a
//! session, keyed by session id. The [`Store`](crate::Store) only ever
//! talks to `dyn SessionHandler`; each backend is an independent type
//! satisfying the same six-operation contract:
//!
//! - [`FileSessionHandler`]: one file per session under a storage
//!   directory.
//! - [`DatabaseSessionHandler`]: rows in a [`SessionTable`] collaborator,
//!   payload base64-encoded.
//! - [`CacheSessionHandler`]: entries in a [`CacheStore`] collaborator
//!   with a fixed TTL.
//! - [`CookieSessionHandler`]: the client's cookie *is* the store; reads
//!   come from the request, writes queue onto a [`CookieJar`].
//!
//! The contract is deliberately forgiving: `read` returns an empty string
//! for anything it cannot produce, and `write`/`destroy` convert internal
//! faults into `false` (logged at `warn`) so one broken backend call
//! degrades a single request's persistence instead of crashing it.

mod cache;
mod cookie;
mod database;
mod file;

pub use cache::{CacheSessionHandler, CacheStore, InMemoryCache};
pub use cookie::{CookieJar, CookieSessionHandler, QueuedCookies, RequestCookies, SetCookie};
pub use database::{DatabaseSessionHandler, InMemoryTable, SessionRecord, SessionTable};
pub use file::FileSessionHandler;

use crate::session::SessionId;

/// Persistence contract shared by every session backend.
pub trait SessionHandler: Send {
    /// Prepare the backend. Most handlers have nothing to do here.
    fn open(&mut self, _save_path: &str, _name: &str) -> bool {
        true
    }

    /// Release the backend. Most handlers have nothing to do here.
    fn close(&mut self) -> bool {
        true
    }

    /// Read the serialized payload for a session id.
    ///
    /// Returns an empty string when the record is absent or unreadable;
    /// never an error.
    fn read(&mut self, id: &SessionId) -> String;

    /// Persist the serialized payload for a session id.
    ///
    /// Internal faults are converted to `false`.
    fn write(&mut self, id: &SessionId, data: &str) -> bool;

    /// Delete the record for a session id.
    ///
    /// Internal faults are converted to `false`.
    fn destroy(&mut self, id: &SessionId) -> bool;

    /// Reclaim records idle for longer than `max_lifetime_secs`.
    ///
    /// Returns the number of records deleted. Backends with their own
    /// expiry (cache, cookie) return 0.
    fn gc(&mut self, max_lifetime_secs: u64) -> usize;

    /// Existence-aware capability, for backends that must distinguish
    /// insert from update. Defaults to absent.
    fn as_existence_aware(&mut self) -> Option<&mut dyn ExistenceAware> {
        None
    }

    /// Request-aware capability, for backends that read the incoming
    /// request directly. Defaults to absent.
    fn as_request_aware(&mut self) -> Option<&mut dyn RequestAware> {
        None
    }
}

impl std::fmt::Debug for dyn SessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn SessionHandler").finish()
    }
}

/// Extension for handlers that track whether a record already exists,
/// to choose insert vs. update on write.
pub trait ExistenceAware {
    /// Force the existence flag, e.g. after the store migrates to a
    /// fresh id.
    fn set_exists(&mut self, exists: bool);
}

/// Extension for handlers that must see the incoming request's cookies.
pub trait RequestAware {
    /// Inject the current request's cookie snapshot.
    fn set_request(&mut self, cookies: RequestCookies);
}
