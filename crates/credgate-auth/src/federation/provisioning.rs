//! Account fields for federated users created on first login.
//!
//! These helpers are pure; the store probing and insert loop live in
//! [`IdentityReconciler`](crate::reconcile::IdentityReconciler).

use rand::Rng;

use super::{FederatedIdentity, ProviderKind};
use crate::storage::NewUser;

/// Returns `len` random lowercase hex characters.
#[must_use]
pub fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

/// Determines the preferred username for a new account.
///
/// In order: the provider-asserted username, the local part of the asserted
/// email, or `<prefix>_<8 hex>` where the prefix depends on the provider.
#[must_use]
pub fn determine_username(identity: &FederatedIdentity, kind: ProviderKind) -> String {
    if let Some(username) = identity.username() {
        return username.to_string();
    }

    if let Some(local) = identity
        .email()
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty())
    {
        return local.to_string();
    }

    format!("{}_{}", kind.username_prefix(), random_hex(8))
}

/// Appends `_` and four random hex characters to `base`.
#[must_use]
pub fn with_collision_suffix(base: &str) -> String {
    format!("{}_{}", base, random_hex(4))
}

/// Builds a unique placeholder email for identities without one.
#[must_use]
pub fn placeholder_email(domain: &str) -> String {
    format!("{}@{}", uuid::Uuid::new_v4(), domain)
}

/// Builds the insert payload for a new federated account.
///
/// The email is verified only if an OIDC provider asserted a real address
/// and marked it verified. Directory emails are never trusted as verified.
#[must_use]
pub fn new_federated_user(
    identity: &FederatedIdentity,
    username: String,
    placeholder_domain: &str,
    password_hash: String,
) -> NewUser {
    let (email, verified) = match identity.email() {
        Some(email) => (
            email.to_string(),
            identity.email_verified && identity.provider == Some(ProviderKind::Oidc),
        ),
        None => (placeholder_email(placeholder_domain), false),
    };

    let mut user = NewUser::new(username, email, password_hash).with_email_verified(verified);
    if let Some(name) = identity.display_name() {
        user = user.with_nickname(name);
    }
    user
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(username: Option<&str>, email: Option<&str>) -> FederatedIdentity {
        let mut identity = FederatedIdentity::new(ProviderKind::Oidc, "sub");
        identity.username = username.map(str::to_string);
        identity.email = email.map(str::to_string);
        identity
    }

    #[test]
    fn test_determine_username_prefers_asserted() {
        let id = identity(Some("alice"), Some("a.liddell@example.com"));
        assert_eq!(determine_username(&id, ProviderKind::Oidc), "alice");
    }

    #[test]
    fn test_determine_username_from_email() {
        let id = identity(None, Some("a.liddell@example.com"));
        assert_eq!(determine_username(&id, ProviderKind::Oidc), "a.liddell");
    }

    #[test]
    fn test_determine_username_placeholder() {
        let oidc = determine_username(&identity(None, None), ProviderKind::Oidc);
        assert!(oidc.starts_with("user_"));
        assert_eq!(oidc.len(), "user_".len() + 8);

        let ldap = determine_username(&identity(Some(""), Some("@x")), ProviderKind::Ldap);
        assert!(ldap.starts_with("ldap_"));
    }

    #[test]
    fn test_collision_suffix() {
        let name = with_collision_suffix("alice");
        assert!(name.starts_with("alice_"));
        assert_eq!(name.len(), "alice_".len() + 4);
        assert!(name[6..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_placeholder_email_is_unique() {
        let a = placeholder_email("no-email.placeholder");
        let b = placeholder_email("no-email.placeholder");
        assert!(a.ends_with("@no-email.placeholder"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_federated_user_fields() {
        let mut id = identity(Some("alice"), Some("alice@example.com"));
        id.email_verified = true;
        id.display_name = Some("Alice".to_string());

        let user = new_federated_user(&id, "alice".to_string(), "x.invalid", "hash".to_string());
        assert_eq!(user.email, "alice@example.com");
        assert!(user.email_verified);
        assert_eq!(user.nickname.as_deref(), Some("Alice"));
        assert!(user.status.is_active());
    }

    #[test]
    fn test_new_federated_user_without_email() {
        let mut id = identity(Some("bob"), None);
        id.email_verified = true;

        let user = new_federated_user(&id, "bob".to_string(), "x.invalid", "hash".to_string());
        assert!(user.email.ends_with("@x.invalid"));
        assert!(!user.email_verified);
        assert!(user.nickname.is_none());
    }

    #[test]
    fn test_directory_email_is_unverified() {
        let mut id = FederatedIdentity::new(ProviderKind::Ldap, "uid=carol,dc=x");
        id.email = Some("carol@corp.local".to_string());
        id.email_verified = true;

        let user = new_federated_user(&id, "carol".to_string(), "x.invalid", "hash".to_string());
        assert_eq!(user.email, "carol@corp.local");
        assert!(!user.email_verified);
    }
}
