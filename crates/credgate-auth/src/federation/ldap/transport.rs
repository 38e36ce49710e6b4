//! Directory protocol seam.
//!
//! [`LdapClient`](super::LdapClient) speaks to the directory only through
//! [`DirectoryConnector`] and [`DirectorySession`]. Production uses
//! [`Ldap3Connector`](super::Ldap3Connector); tests substitute an in-memory
//! directory.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::AuthError;

/// LDAP result code for a rejected simple bind.
pub const RC_INVALID_CREDENTIALS: u32 = 49;

/// LDAP result code returned when a search hit its size limit.
pub const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;

/// Errors reported by a directory transport.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The server could not be reached or TLS negotiation failed.
    #[error("Failed to connect to directory: {0}")]
    Connect(String),

    /// A bind was rejected with `invalidCredentials`.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The operation did not finish within the configured bound.
    #[error("Directory operation timed out")]
    Timeout,

    /// The server returned a non-success result code.
    #[error("Directory operation failed (rc={rc}): {message}")]
    Operation {
        /// LDAP result code, 0 if the failure happened below the protocol.
        rc: u32,
        /// Diagnostic message.
        message: String,
    },
}

impl DirectoryError {
    /// Creates an `Operation` error.
    #[must_use]
    pub fn operation(rc: u32, message: impl Into<String>) -> Self {
        Self::Operation {
            rc,
            message: message.into(),
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidCredentials => AuthError::DirectoryInvalidCredentials,
            other => AuthError::directory_unavailable(other.to_string()),
        }
    }
}

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// The base entry and everything below it.
    Subtree,
}

/// An entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name.
    pub dn: String,
    /// Attribute values keyed by attribute name.
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Adds an attribute value.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.entry(name.into()).or_default().push(value.into());
        self
    }

    /// All values of an attribute. Attribute names compare case-insensitively.
    #[must_use]
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// First non-empty value of an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        if name.is_empty() {
            return None;
        }
        self.values(name)
            .iter()
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }
}

/// Opens directory connections.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Opens a new connection. There is no pooling; every call dials.
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// One open directory connection.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind. An empty DN and password is an anonymous bind.
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Searches below `base`, returning at most `size_limit` entries
    /// (0 means no client-side limit).
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[String],
        size_limit: i32,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Closes the connection.
    async fn unbind(&mut self) -> Result<(), DirectoryError>;
}
