//! # session-vault
//!
//! Pluggable server-side session store with flash data and CSRF tokens.
//!
//! This crate provides the session layer of a web application: one
//! [`Store`] per request holding attributes, flash data, a CSRF token, and
//! registered sub-bags, persisted through an interchangeable
//! [`SessionHandler`] backend (file, database table, cache, or the client's
//! own cookie).
//!
//! ## Features
//!
//! - **Dotted-key attributes**: `store.put("user.name", "alice")` creates
//!   nested structure on demand
//! - **Flash data**: values visible for exactly one request beyond the one
//!   that set them, with `reflash`/`keep` to extend
//! - **Session fixation defense**: `migrate`/`regenerate`/`invalidate`
//!   swap ids, optionally destroying the old record
//! - **Swappable backends**: four handlers behind one six-operation
//!   contract, plus in-memory collaborators for tests
//!
//! ## Quick Start
//!
//! ```no_run
//! use session_vault::{Config, SessionManager};
//!
//! fn main() -> session_vault::Result<()> {
//!     // Initialize logging
//!     session_vault::logging::try_init().ok();
//!
//!     // One manager per application, one store per request
//!     let manager = SessionManager::new(Config::default());
//!     let mut store = manager.store(None)?;
//!
//!     store.start();
//!     store.put("user.name", "alice");
//!     store.flash("status", "profile saved");
//!     store.save()?;
//!
//!     println!("Session {} persisted", store.id());
//!
//!     Ok(())
//! }
//! ```

pub mod bag;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod manager;
pub mod session;

// Re-export commonly used types
pub use bag::{AttributeBag, MetadataBag, SessionBag};
pub use config::{Config, ConfigError, CookieSection, Driver};
pub use error::{Result, SessionVaultError};
pub use handler::{
    CacheSessionHandler, CacheStore, CookieJar, CookieSessionHandler, DatabaseSessionHandler,
    ExistenceAware, FileSessionHandler, InMemoryCache, InMemoryTable, QueuedCookies,
    RequestAware, RequestCookies, SessionHandler, SessionRecord, SessionTable, SetCookie,
};
pub use manager::SessionManager;
pub use session::{AttributeMap, SessionId, Store};
