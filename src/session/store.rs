//! Per-request session store.

use std::collections::HashMap;

use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{AttributeMap, SessionId};
use crate::bag::{MetadataBag, SessionBag};
use crate::error::{Result, SessionVaultError};
use crate::handler::{RequestCookies, SessionHandler};

/// Attribute key holding the CSRF token.
const TOKEN_KEY: &str = "_token";

/// Attribute key listing keys flashed during the current cycle.
const FLASH_NEW_KEY: &str = "_flash.new";

/// Attribute key listing keys flashed during the previous cycle, due for
/// removal at the next save.
const FLASH_OLD_KEY: &str = "_flash.old";

/// CSRF tokens share the session id alphabet and length.
const TOKEN_LENGTH: usize = 40;

/// Single source of truth for one session's data during one request.
///
/// A `Store` is constructed per request by the owning middleware, bound to
/// one [`SessionHandler`]. `start()` loads the persisted state, application
/// code reads and writes attributes, and `save()` flushes back to the
/// handler before the response is sent:
///
/// `NotStarted -> start() -> Started -> save() -> NotStarted`
///
/// `migrate` and `invalidate` are valid in either state and do not change
/// the started flag.
///
/// The keys `_token`, `_flash`, `_meta`, and `_bag` are reserved for the
/// store's own bookkeeping.
#[derive(Debug)]
pub struct Store {
    id: SessionId,
    name: String,
    attributes: AttributeMap,
    bags: HashMap<String, Box<dyn SessionBag>>,
    metadata: MetadataBag,
    handler: Box<dyn SessionHandler>,
    started: bool,
}

impl Store {
    /// Create a store bound to a handler.
    ///
    /// `id` follows the generous validation policy of [`Store::set_id`]:
    /// anything other than a well-formed 40-character alphanumeric id is
    /// silently replaced with a freshly generated one.
    pub fn new(name: impl Into<String>, handler: Box<dyn SessionHandler>, id: Option<&str>) -> Self {
        let mut store = Self {
            id: SessionId::generate(),
            name: name.into(),
            attributes: AttributeMap::new(),
            bags: HashMap::new(),
            metadata: MetadataBag::new(),
            handler,
            started: false,
        };
        store.set_id(id);
        store
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load the session from the handler and mark it started.
    ///
    /// An absent, unreadable, or corrupt persisted blob yields an empty
    /// session; `start` itself never fails. Ensures a CSRF token exists.
    pub fn start(&mut self) -> bool {
        self.load_session();
        if !self.has(TOKEN_KEY) {
            self.regenerate_token();
        }
        self.started = true;
        true
    }

    /// Persist the session through the handler and mark it not started.
    ///
    /// Writes every registered bag's data back into the attributes, ages
    /// the flash data (so this mutates attributes even when nothing else
    /// changed), then serializes and writes. A handler that reports write
    /// failure surfaces as [`SessionVaultError::WriteFailed`]; the
    /// in-memory state stays as-is and simply was not made durable.
    pub fn save(&mut self) -> Result<()> {
        self.add_bag_data_to_session();
        self.age_flash_data();

        let blob = self.attributes.to_blob()?;
        let written = self.handler.write(&self.id, &blob);
        self.started = false;

        if written {
            debug!(session = %self.id, "session persisted");
            Ok(())
        } else {
            Err(SessionVaultError::WriteFailed(self.id.to_string()))
        }
    }

    /// Whether the store is between `start()` and `save()`.
    pub fn is_started(&self) -> bool {
        self.started
    }

    fn load_session(&mut self) {
        self.attributes = self.read_from_handler();

        let data = pull_bag_data(&mut self.attributes, self.metadata.storage_key());
        self.metadata.initialize(data);

        for bag in self.bags.values_mut() {
            let data = pull_bag_data(&mut self.attributes, bag.storage_key());
            bag.initialize(data);
        }
    }

    fn read_from_handler(&mut self) -> AttributeMap {
        let blob = self.handler.read(&self.id);
        if blob.is_empty() {
            return AttributeMap::new();
        }
        match AttributeMap::from_blob(&blob) {
            Ok(attributes) => attributes,
            Err(e) => {
                // Fail open: one corrupt record becomes an empty session
                // instead of a permanently broken client.
                warn!(session = %self.id, error = %e, "corrupt session payload, starting empty");
                AttributeMap::new()
            }
        }
    }

    fn add_bag_data_to_session(&mut self) {
        let meta = self.metadata.data();
        self.attributes
            .set(self.metadata.storage_key(), Value::Object(meta));

        for bag in self.bags.values() {
            self.attributes
                .set(bag.storage_key(), Value::Object(bag.data()));
        }
    }

    // ------------------------------------------------------------------
    // Attribute access
    // ------------------------------------------------------------------

    /// Get the value at a dotted key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// True if the key is present with a non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).map(|v| !v.is_null()).unwrap_or(false)
    }

    /// True if the key is present at all, null included.
    pub fn exists(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    /// Set the value at a dotted key.
    pub fn put(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.set(key, value.into());
    }

    /// Set a raw JSON value at a dotted key. Equivalent to [`Store::put`];
    /// kept for callers that already hold a `Value`.
    pub fn set(&mut self, key: &str, value: Value) {
        self.attributes.set(key, value);
    }

    /// Append a value to the array at a dotted key, creating it if absent.
    pub fn push(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.push(key, value.into());
    }

    /// Remove the value at a dotted key and return it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.pull(key)
    }

    /// Remove the value at a dotted key, discarding it.
    pub fn forget(&mut self, key: &str) {
        self.attributes.forget(key);
    }

    /// Replace every attribute with the given mapping.
    pub fn replace(&mut self, attributes: Map<String, Value>) {
        self.attributes.replace(attributes);
    }

    /// View the full attribute mapping.
    pub fn all(&self) -> &Map<String, Value> {
        self.attributes.all()
    }

    /// Remove every attribute.
    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    /// Alias for [`Store::clear`].
    pub fn flush(&mut self) {
        self.clear();
    }

    // ------------------------------------------------------------------
    // Flash data
    // ------------------------------------------------------------------

    /// Store a value visible for the rest of this cycle and the next one.
    pub fn flash(&mut self, key: &str, value: impl Into<Value>) {
        self.put(key, value);
        self.merge_new_flashes(&[key.to_string()]);
        // A key flashed again this cycle must not be pruned by ageing
        // before it is read.
        self.remove_from_old_flash(&[key.to_string()]);
    }

    /// Extend the visibility of all flashed values by one more cycle.
    pub fn reflash(&mut self) {
        let old = self.old_flash_keys();
        self.merge_new_flashes(&old);
        self.attributes.set(FLASH_OLD_KEY, Value::Array(Vec::new()));
    }

    /// Extend the visibility of the named flashed values by one more
    /// cycle.
    pub fn keep(&mut self, keys: &[&str]) {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.merge_new_flashes(&keys);
        self.remove_from_old_flash(&keys);
    }

    /// Age the flash data one cycle: prune every key listed in the old
    /// set, then demote the new set to old.
    ///
    /// Runs exactly once per [`Store::save`], never on read-only access.
    pub fn age_flash_data(&mut self) {
        for key in self.old_flash_keys() {
            self.attributes.forget(&key);
        }
        let new = self
            .attributes
            .pull(FLASH_NEW_KEY)
            .unwrap_or(Value::Array(Vec::new()));
        self.attributes.set(FLASH_OLD_KEY, new);
        self.attributes.set(FLASH_NEW_KEY, Value::Array(Vec::new()));
    }

    fn flash_keys(&self, key: &str) -> Vec<String> {
        self.attributes
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn old_flash_keys(&self) -> Vec<String> {
        self.flash_keys(FLASH_OLD_KEY)
    }

    fn merge_new_flashes(&mut self, keys: &[String]) {
        let mut new = self.flash_keys(FLASH_NEW_KEY);
        for key in keys {
            if !new.contains(key) {
                new.push(key.clone());
            }
        }
        self.attributes.set(
            FLASH_NEW_KEY,
            Value::Array(new.into_iter().map(Value::from).collect()),
        );
    }

    fn remove_from_old_flash(&mut self, keys: &[String]) {
        let remaining: Vec<Value> = self
            .old_flash_keys()
            .into_iter()
            .filter(|k| !keys.contains(k))
            .map(Value::from)
            .collect();
        self.attributes.set(FLASH_OLD_KEY, Value::Array(remaining));
    }

    // ------------------------------------------------------------------
    // CSRF token
    // ------------------------------------------------------------------

    /// The session's CSRF token. Empty before the first `start()`.
    pub fn token(&self) -> &str {
        self.attributes
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Replace the CSRF token with a fresh random value.
    pub fn regenerate_token(&mut self) {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        self.put(TOKEN_KEY, token);
    }

    // ------------------------------------------------------------------
    // Id & migration
    // ------------------------------------------------------------------

    /// The current session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Set the session id.
    ///
    /// Anything other than a well-formed 40-character alphanumeric id —
    /// malformed, wrong length, or `None` — is silently replaced with a
    /// freshly generated id, never an error.
    pub fn set_id(&mut self, id: Option<&str>) {
        self.id = id
            .and_then(SessionId::parse)
            .unwrap_or_else(SessionId::generate);
    }

    /// The session (cookie) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the session (cookie) name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Assign a freshly generated id, optionally destroying the old
    /// persisted record first.
    ///
    /// Existence-aware handlers are reset so their next write inserts
    /// under the new id. A failed destroy of the old record is logged and
    /// otherwise ignored; the new session is unaffected.
    pub fn migrate(&mut self, destroy: bool) -> bool {
        if destroy && !self.handler.destroy(&self.id) {
            warn!(session = %self.id, "failed to destroy old session record");
        }

        if let Some(existence) = self.handler.as_existence_aware() {
            existence.set_exists(false);
        }

        self.id = SessionId::generate();
        true
    }

    /// Alias for [`Store::migrate`], used to defeat session fixation.
    pub fn regenerate(&mut self, destroy: bool) -> bool {
        self.migrate(destroy)
    }

    /// Wipe all attributes and move to a fresh id.
    ///
    /// The old persisted record is left for garbage collection to
    /// reclaim rather than destroyed here.
    pub fn invalidate(&mut self) -> bool {
        self.flush();
        self.migrate(false)
    }

    // ------------------------------------------------------------------
    // Bags
    // ------------------------------------------------------------------

    /// Register a bag. Must happen before `start()` for the bag to be
    /// hydrated from persisted data.
    pub fn register_bag(&mut self, bag: Box<dyn SessionBag>) {
        self.bags.insert(bag.name().to_string(), bag);
    }

    /// Get a registered bag by name.
    pub fn get_bag(&self, name: &str) -> Result<&(dyn SessionBag + '_)> {
        self.bags
            .get(name)
            .map(|bag| bag.as_ref())
            .ok_or_else(|| SessionVaultError::BagNotRegistered(name.to_string()))
    }

    /// Get a registered bag by name, mutably.
    pub fn get_bag_mut(&mut self, name: &str) -> Result<&mut (dyn SessionBag + '_)> {
        match self.bags.get_mut(name) {
            Some(bag) => Ok(bag.as_mut()),
            None => Err(SessionVaultError::BagNotRegistered(name.to_string())),
        }
    }

    /// The session's metadata bag.
    pub fn metadata(&self) -> &MetadataBag {
        &self.metadata
    }

    // ------------------------------------------------------------------
    // Handler passthroughs
    // ------------------------------------------------------------------

    /// True if the handler must see the incoming request's cookies.
    pub fn handler_needs_request(&mut self) -> bool {
        self.handler.as_request_aware().is_some()
    }

    /// Inject the request cookie snapshot into a request-aware handler.
    /// No-op for every other handler.
    pub fn set_request_on_handler(&mut self, cookies: RequestCookies) {
        if let Some(aware) = self.handler.as_request_aware() {
            aware.set_request(cookies);
        }
    }

    /// Reclaim records idle longer than `max_lifetime_secs`, returning
    /// the count. Triggered probabilistically by the owning middleware.
    pub fn collect_garbage(&mut self, max_lifetime_secs: u64) -> usize {
        self.handler.gc(max_lifetime_secs)
    }
}

fn pull_bag_data(attributes: &mut AttributeMap, key: &str) -> Map<String, Value> {
    match attributes.pull(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
