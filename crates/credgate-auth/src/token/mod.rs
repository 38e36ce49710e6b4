//! Token issuance and revocation.
//!
//! - [`jwt`] signs and validates HS256 tokens
//! - [`blacklist`] records revoked tokens and pairs in the shared cache
//! - [`service`] ties them together into the pair lifecycle

pub mod blacklist;
pub mod jwt;
pub mod service;

pub use blacklist::Blacklist;
pub use jwt::{JwtCodec, JwtError, TokenClaims, TokenKind};
pub use service::{TokenPair, TokenService};
