//! Signed-cookie sessions.
//!
//! The cookie value is `base64url(json).base64url(HMAC-SHA256(json))`, where
//! the JSON payload carries the session data and an expiry timestamp. A
//! cookie that fails to decode, verify or is expired yields an empty session;
//! it never fails the request.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::RenderError;
use crate::value::Value;

/// Session cookie configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Cookie name. Defaults to `session`.
    pub cookie_name: String,
    /// HMAC signing secret. Must not be empty.
    pub secret: String,
    /// Lifetime of a written cookie. Defaults to one week.
    pub max_age: Duration,
}

impl SessionOptions {
    /// Options with the default cookie name and lifetime.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            cookie_name: "session".to_string(),
            secret: secret.into(),
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// Set the cookie name.
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie lifetime.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Payload {
    data: IndexMap<String, serde_json::Value>,
    /// Expiry, seconds since the Unix epoch.
    exp: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    data: IndexMap<String, serde_json::Value>,
    modified: bool,
}

/// A request's session. Clones share the same data.
#[derive(Debug, Clone)]
pub struct Session {
    options: Arc<SessionOptions>,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    /// Load the session from a `Cookie` header.
    ///
    /// Fails only when `options` has no secret.
    pub fn load(options: SessionOptions, cookie_header: Option<&str>) -> Result<Self, RenderError> {
        Self::load_at(options, cookie_header, SystemTime::now())
    }

    pub(crate) fn load_at(
        options: SessionOptions,
        cookie_header: Option<&str>,
        now: SystemTime,
    ) -> Result<Self, RenderError> {
        if options.secret.is_empty() {
            return Err(RenderError::MissingSessionSecret);
        }
        let data = cookie_header
            .and_then(|header| find_cookie(header, &options.cookie_name))
            .and_then(|value| verify(&options.secret, &value, unix_secs(now)))
            .unwrap_or_default();
        Ok(Self {
            options: Arc::new(options),
            state: Arc::new(Mutex::new(SessionState {
                data,
                modified: false,
            })),
        })
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().data.get(key).cloned().map(Value::from)
    }

    /// Write a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut state = self.state.lock();
        state.data.insert(key.into(), value.into().to_json());
        state.modified = true;
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock();
        let removed = state.data.shift_remove(key);
        if removed.is_some() {
            state.modified = true;
        }
        removed.map(Value::from)
    }

    /// Remove every value.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.modified |= !state.data.is_empty();
        state.data.clear();
    }

    /// Returns true if the session has no values.
    pub fn is_empty(&self) -> bool {
        self.state.lock().data.is_empty()
    }

    /// Returns true if the session was written since it was loaded.
    pub fn is_modified(&self) -> bool {
        self.state.lock().modified
    }

    /// A `Set-Cookie` header value carrying the current data.
    pub fn to_set_cookie(&self) -> String {
        self.to_set_cookie_at(SystemTime::now())
    }

    pub(crate) fn to_set_cookie_at(&self, now: SystemTime) -> String {
        let payload = Payload {
            data: self.state.lock().data.clone(),
            exp: unix_secs(now) + self.options.max_age.as_secs(),
        };
        let max_age = i64::try_from(self.options.max_age.as_secs()).unwrap_or(i64::MAX);
        Cookie::build((self.options.cookie_name.clone(), sign(&self.options.secret, &payload)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::seconds(max_age))
            .build()
            .to_string()
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

fn mac(secret: &str) -> Option<Hmac<Sha256>> {
    Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()
}

fn sign(secret: &str, payload: &Payload) -> String {
    // Serializing a map of JSON values cannot fail.
    let json = serde_json::to_vec(payload).unwrap_or_default();
    let signature = match mac(secret) {
        Some(mut mac) => {
            mac.update(&json);
            mac.finalize().into_bytes().to_vec()
        }
        None => Vec::new(),
    };
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&json),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

fn verify(secret: &str, value: &str, now: u64) -> Option<IndexMap<String, serde_json::Value>> {
    let (body, signature) = value.split_once('.')?;
    let json = URL_SAFE_NO_PAD.decode(body).ok()?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
    let mut mac = mac(secret)?;
    mac.update(&json);
    if mac.verify_slice(&signature).is_err() {
        tracing::debug!("session cookie signature mismatch");
        return None;
    }
    let payload: Payload = serde_json::from_slice(&json).ok()?;
    if payload.exp <= now {
        tracing::debug!("session cookie expired");
        return None;
    }
    Some(payload.data)
}
