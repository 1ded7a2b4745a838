//! Creates, validates and destroys the sessions of signed-in users.
//!
//! A session is a record in the [EntityType::Session] partition keyed by a
//! random token. The token is handed to the client in the `SESSION_ID` cookie
//! and checked on every request to a protected route.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    store::{EntityType, Item, ItemKey, KeyValueStore},
};

/// How long a session lasts after sign-in.
pub const SESSION_DURATION: Duration = Duration::days(30);

/// An opaque, unguessable session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a new token from 128 random bits.
    pub fn generate() -> Self {
        let bits: u128 = rand::random();

        Self(format!("{bits:032x}"))
    }

    /// Wrap a token received from a client.
    #[cfg(test)]
    pub fn new_unchecked(raw_token: &str) -> Self {
        Self(raw_token.to_owned())
    }

    /// The token as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// The email of the signed-in account.
    pub email: String,
    /// The name of the signed-in account.
    pub name: String,
}

/// A new session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The token that identifies the session.
    pub token: SessionToken,
    /// When the session stops being valid.
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    email: String,
    name: String,
    expires_at: i64,
}

fn session_key(token: &str) -> ItemKey {
    ItemKey::new(EntityType::Session, token)
}

/// Create a session for the account `email` that lasts [SESSION_DURATION].
///
/// # Errors
/// Returns an error if the session could not be written to the store.
pub fn create_session(store: &dyn KeyValueStore, email: &str, name: &str) -> Result<Session, Error> {
    create_session_with_duration(store, email, name, SESSION_DURATION)
}

/// Create a session for the account `email` that lasts `duration`.
///
/// # Errors
/// Returns an error if the session could not be written to the store.
pub fn create_session_with_duration(
    store: &dyn KeyValueStore,
    email: &str,
    name: &str,
    duration: Duration,
) -> Result<Session, Error> {
    let token = SessionToken::generate();
    let expires_at = OffsetDateTime::now_utc() + duration;
    let record = SessionRecord {
        email: email.to_owned(),
        name: name.to_owned(),
        expires_at: expires_at.unix_timestamp(),
    };

    let item = Item::from_record(session_key(token.as_str()), &record)?.expires_at(expires_at);
    store.put(item)?;
    tracing::debug!("Created session for {email}, expires at {expires_at}");

    Ok(Session { token, expires_at })
}

/// Look up the session for `token`.
///
/// Returns `None` if the token is missing or empty, there is no such session,
/// or the session has expired. Expiry is checked here rather than relying on
/// the store having evicted the record already.
///
/// # Errors
/// Returns an error if the store could not be read.
pub fn validate_session(
    store: &dyn KeyValueStore,
    token: Option<&str>,
) -> Result<Option<SessionData>, Error> {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return Ok(None),
    };

    let item = match store.get(&session_key(token))? {
        Some(item) => item,
        None => return Ok(None),
    };

    let now = OffsetDateTime::now_utc();
    let record: SessionRecord = item.to_record()?;

    if item.is_expired(now) || record.expires_at <= now.unix_timestamp() {
        tracing::debug!("Rejected expired session for {}", record.email);
        return Ok(None);
    }

    Ok(Some(SessionData {
        email: record.email,
        name: record.name,
    }))
}

/// Delete the session for `token`. Deleting a session that does not exist succeeds.
///
/// # Errors
/// Returns an error if the store could not be written to.
pub fn destroy_session(store: &dyn KeyValueStore, token: &str) -> Result<(), Error> {
    store.delete(&session_key(token))
}
