//! LDAP / Active Directory federation.
//!
//! Authentication is bind-search-bind: bind as the service account (or
//! anonymously), search the user by filter, then bind again as the found
//! entry with the caller's password. Only that last bind can produce
//! `DirectoryInvalidCredentials`.

pub mod client;
pub mod connector;
pub mod mapping;
pub mod transport;

pub use client::LdapClient;
pub use connector::Ldap3Connector;
pub use transport::{
    DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, SearchScope,
};
