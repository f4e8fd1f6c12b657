//! Session manager.
//!
//! Builds per-request [`Store`]s from a [`Config`] and the injected
//! collaborators each driver needs. The manager is long-lived; the stores
//! it hands out live for one request each.

use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::config::{Config, Driver};
use crate::error::{Result, SessionVaultError};
use crate::handler::{
    CacheSessionHandler, CacheStore, CookieJar, CookieSessionHandler, DatabaseSessionHandler,
    FileSessionHandler, SessionHandler, SessionTable,
};
use crate::session::Store;

/// Factory for session stores.
///
/// The file driver works out of the box; the database, cache, and cookie
/// drivers need their collaborator injected first:
///
/// ```no_run
/// use session_vault::{Config, InMemoryTable, SessionManager};
///
/// let mut config = Config::default();
/// config.driver = "database".parse().unwrap();
///
/// let manager = SessionManager::new(config).with_table(InMemoryTable::shared());
/// let mut store = manager.store(None).unwrap();
/// store.start();
/// ```
pub struct SessionManager {
    config: Config,
    table: Option<Arc<Mutex<dyn SessionTable>>>,
    cache: Option<Arc<Mutex<dyn CacheStore>>>,
    cookie_jar: Option<Arc<Mutex<dyn CookieJar>>>,
}

impl SessionManager {
    /// Create a manager for the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            table: None,
            cache: None,
            cookie_jar: None,
        }
    }

    /// Inject the session table backing the database driver.
    pub fn with_table(mut self, table: Arc<Mutex<dyn SessionTable>>) -> Self {
        self.table = Some(table);
        self
    }

    /// Inject the cache backing the cache driver.
    pub fn with_cache(mut self, cache: Arc<Mutex<dyn CacheStore>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Inject the response cookie jar the cookie driver queues onto.
    pub fn with_cookie_jar(mut self, jar: Arc<Mutex<dyn CookieJar>>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// The manager's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a store for one request.
    ///
    /// `id` is the session id from the incoming request's cookie, if any;
    /// invalid or absent ids get a fresh one.
    pub fn store(&self, id: Option<&str>) -> Result<Store> {
        let handler = self.build_handler()?;
        Ok(Store::new(self.config.cookie.name.clone(), handler, id))
    }

    /// Roll the configured gc lottery.
    ///
    /// The owning middleware calls this once per request and runs
    /// [`Store::collect_garbage`] on a win, so sweeps happen on a
    /// configurable fraction of requests.
    pub fn hits_gc_lottery(&self) -> bool {
        let (chances, out_of) = self.config.lottery;
        if chances == 0 {
            return false;
        }
        rand::rng().random_range(0..out_of) < chances
    }

    fn build_handler(&self) -> Result<Box<dyn SessionHandler>> {
        match self.config.driver {
            Driver::File => Ok(Box::new(FileSessionHandler::new(&self.config.files))),
            Driver::Database => {
                let table = self.table.clone().ok_or(
                    SessionVaultError::MissingCollaborator {
                        driver: "database",
                        collaborator: "session table",
                    },
                )?;
                Ok(Box::new(DatabaseSessionHandler::new(table)))
            }
            Driver::Cache => {
                let cache = self.cache.clone().ok_or(
                    SessionVaultError::MissingCollaborator {
                        driver: "cache",
                        collaborator: "cache store",
                    },
                )?;
                Ok(Box::new(CacheSessionHandler::new(
                    cache,
                    self.config.lifetime_minutes,
                )))
            }
            Driver::Cookie => {
                let jar = self.cookie_jar.clone().ok_or(
                    SessionVaultError::MissingCollaborator {
                        driver: "cookie",
                        collaborator: "cookie jar",
                    },
                )?;
                Ok(Box::new(CookieSessionHandler::new(
                    jar,
                    self.config.lifetime_minutes,
                )))
            }
        }
    }
}
