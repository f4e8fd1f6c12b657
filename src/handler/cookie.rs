//! Cookie-backed session handler.
//!
//! There is no server-side record: the session payload travels in the
//! client's cookie. Reads come straight from the incoming request's
//! cookie snapshot, which the store injects through the request-aware
//! capability; writes queue an outgoing `Set-Cookie` on a shared jar the
//! middleware drains into the response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::{RequestAware, SessionHandler};
use crate::session::SessionId;

/// Snapshot of the incoming request's cookies.
///
/// Built by the owning middleware from its framework's request type and
/// handed to the store before `start()`.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    cookies: HashMap<String, String>,
}

impl RequestCookies {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cookie to the snapshot.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Get a cookie value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|v| v.as_str())
    }
}

impl FromIterator<(String, String)> for RequestCookies {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            cookies: iter.into_iter().collect(),
        }
    }
}

/// An outgoing `Set-Cookie` queued for the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    /// Cookie name. For session payloads this is the session id.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Lifetime in seconds; 0 instructs the client to drop the cookie.
    pub max_age_secs: u64,
}

impl SetCookie {
    /// True if this cookie removes rather than sets a value.
    pub fn is_removal(&self) -> bool {
        self.max_age_secs == 0
    }
}

/// Destination for outgoing cookies, drained into the response by the
/// owning middleware.
pub trait CookieJar: Send {
    /// Queue a cookie for the response.
    fn queue(&mut self, cookie: SetCookie);
}

/// In-memory [`CookieJar`] collecting queued cookies in order.
#[derive(Debug, Default)]
pub struct QueuedCookies {
    queued: Vec<SetCookie>,
}

impl QueuedCookies {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty jar behind the shared handle the handler expects.
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// The cookies queued so far, oldest first.
    pub fn queued(&self) -> &[SetCookie] {
        &self.queued
    }

    /// Take every queued cookie, leaving the jar empty.
    pub fn drain(&mut self) -> Vec<SetCookie> {
        std::mem::take(&mut self.queued)
    }
}

impl CookieJar for QueuedCookies {
    fn queue(&mut self, cookie: SetCookie) {
        self.queued.push(cookie);
    }
}

/// Persists the session payload in the client's cookie.
///
/// `open`, `close`, and `gc` are no-ops: there is no server-side storage
/// to prepare or clean.
pub struct CookieSessionHandler {
    jar: Arc<Mutex<dyn CookieJar>>,
    request: Option<RequestCookies>,
    lifetime_minutes: u64,
}

impl CookieSessionHandler {
    /// Create a handler queueing onto a shared jar, with the given cookie
    /// lifetime.
    pub fn new(jar: Arc<Mutex<dyn CookieJar>>, lifetime_minutes: u64) -> Self {
        Self {
            jar,
            request: None,
            lifetime_minutes,
        }
    }

    fn queue(&self, cookie: SetCookie) -> bool {
        match self.jar.lock() {
            Ok(mut jar) => {
                jar.queue(cookie);
                true
            }
            Err(_) => {
                warn!("cookie jar lock poisoned");
                false
            }
        }
    }
}

impl SessionHandler for CookieSessionHandler {
    fn read(&mut self, id: &SessionId) -> String {
        match &self.request {
            Some(request) => request.get(id.as_str()).unwrap_or_default().to_string(),
            None => {
                debug!(session = %id, "no request injected, reading empty session");
                String::new()
            }
        }
    }

    fn write(&mut self, id: &SessionId, data: &str) -> bool {
        self.queue(SetCookie {
            name: id.as_str().to_string(),
            value: data.to_string(),
            max_age_secs: self.lifetime_minutes * 60,
        })
    }

    fn destroy(&mut self, id: &SessionId) -> bool {
        self.queue(SetCookie {
            name: id.as_str().to_string(),
            value: String::new(),
            max_age_secs: 0,
        })
    }

    fn gc(&mut self, _max_lifetime_secs: u64) -> usize {
        0
    }

    fn as_request_aware(&mut self) -> Option<&mut dyn RequestAware> {
        Some(self)
    }
}

impl RequestAware for CookieSessionHandler {
    fn set_request(&mut self, cookies: RequestCookies) {
        self.request = Some(cookies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_without_request_is_empty() {
        let jar = QueuedCookies::shared();
        let mut handler = CookieSessionHandler::new(jar, 30);
        assert_eq!(handler.read(&SessionId::generate()), "");
    }

    #[test]
    fn test_read_from_injected_request() {
        let jar = QueuedCookies::shared();
        let mut handler = CookieSessionHandler::new(jar, 30);
        let id = SessionId::generate();

        let mut cookies = RequestCookies::new();
        cookies.insert(id.as_str(), r#"{"user":"alice"}"#);
        handler
            .as_request_aware()
            .expect("cookie handler is request-aware")
            .set_request(cookies);

        assert_eq!(handler.read(&id), r#"{"user":"alice"}"#);

        // A different session id finds nothing in the same request.
        assert_eq!(handler.read(&SessionId::generate()), "");
    }

    #[test]
    fn test_write_queues_payload_cookie() {
        let jar = QueuedCookies::shared();
        let mut handler = CookieSessionHandler::new(jar.clone(), 30);
        let id = SessionId::generate();

        assert!(handler.write(&id, "payload"));

        let queued = jar.lock().unwrap().drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].name, id.as_str());
        assert_eq!(queued[0].value, "payload");
        assert_eq!(queued[0].max_age_secs, 30 * 60);
        assert!(!queued[0].is_removal());
    }

    #[test]
    fn test_destroy_queues_removal_cookie() {
        let jar = QueuedCookies::shared();
        let mut handler = CookieSessionHandler::new(jar.clone(), 30);
        let id = SessionId::generate();

        assert!(handler.destroy(&id));

        let queued = jar.lock().unwrap().drain();
        assert_eq!(queued.len(), 1);
        assert!(queued[0].is_removal());
        assert_eq!(queued[0].value, "");
    }

    #[test]
    fn test_drain_empties_jar() {
        let mut jar = QueuedCookies::new();
        jar.queue(SetCookie {
            name: "a".into(),
            value: "1".into(),
            max_age_secs: 60,
        });

        assert_eq!(jar.queued().len(), 1);
        assert_eq!(jar.drain().len(), 1);
        assert!(jar.queued().is_empty());
    }

    #[test]
    fn test_gc_is_noop() {
        let jar = QueuedCookies::shared();
        let mut handler = CookieSessionHandler::new(jar, 30);
        assert_eq!(handler.gc(0), 0);
    }
}
