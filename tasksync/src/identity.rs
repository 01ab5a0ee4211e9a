//! Identity context: who the current user is and which access key to send.
//!
//! The engine only reads credentials. On an authentication rejection it
//! calls [`IdentityProvider::invalidate`], after which every gateway call
//! fails fast with [`GatewayError::MissingCredentials`](crate::gateway::GatewayError)
//! until the user signs in again.

use std::fmt;

/// Errors raised while establishing an identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The display name is blank.
    #[error("user name is empty")]
    EmptyName,
    /// The access key is blank.
    #[error("access key is empty")]
    EmptyKey,
}

/// User name plus opaque access key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Display name, also used as the author of placeholders.
    pub user_name: String,
    /// Opaque access credential sent as `X-API-Key`.
    pub api_key: String,
}

impl Credentials {
    /// Builds credentials from raw input, trimming both fields.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] if either field is blank after trimming.
    pub fn new(user_name: &str, api_key: &str) -> Result<Self, IdentityError> {
        let user_name = user_name.trim();
        let api_key = api_key.trim();
        if user_name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        if api_key.is_empty() {
            return Err(IdentityError::EmptyKey);
        }
        Ok(Self {
            user_name: user_name.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

// Keep the key out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Source of the current identity.
pub trait IdentityProvider {
    /// Current credentials, or `None` when signed out.
    fn credentials(&self) -> Option<Credentials>;

    /// Drops the current identity (auth rejection or explicit sign-out).
    fn invalidate(&mut self);

    /// Installs a new identity.
    fn sign_in(&mut self, credentials: Credentials);
}

/// In-process identity seeded from configuration.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    current: Option<Credentials>,
}

impl SessionIdentity {
    /// Creates an identity, signed in if `credentials` is given.
    #[must_use]
    pub const fn new(credentials: Option<Credentials>) -> Self {
        Self {
            current: credentials,
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn credentials(&self) -> Option<Credentials> {
        self.current.clone()
    }

    fn invalidate(&mut self) {
        if self.current.take().is_some() {
            tracing::info!("identity invalidated");
        }
    }

    fn sign_in(&mut self, credentials: Credentials) {
        tracing::info!(user = %credentials.user_name, "signed in");
        self.current = Some(credentials);
    }
}
