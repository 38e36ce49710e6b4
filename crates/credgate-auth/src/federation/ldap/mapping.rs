//! Filter construction and entry-to-identity mapping.

use super::transport::DirectoryEntry;
use crate::config::LdapConfig;
use crate::federation::{FederatedIdentity, ProviderKind};

/// Substitutes the RFC 4515-escaped `value` into every `%s` of `template`.
#[must_use]
pub fn fill_filter(template: &str, value: &str) -> String {
    template.replace("%s", &ldap3::ldap_escape(value))
}

/// Attributes requested from user searches; `*` when none are configured.
#[must_use]
pub fn user_attributes(config: &LdapConfig) -> Vec<String> {
    if config.user_attributes.is_empty() {
        vec!["*".to_string()]
    } else {
        config.user_attributes.clone()
    }
}

fn first_of(entry: &DirectoryEntry, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| entry.first(name))
        .map(str::to_string)
}

/// Maps a user entry into a federated identity.
///
/// Configured attribute names win; otherwise common schema names are tried:
/// username `uid`, `sAMAccountName`, `cn`; email `mail`; display name
/// `displayName`, `cn`. Groups come from `group_member_attr` if set,
/// else `memberOf`.
#[must_use]
pub fn entry_to_identity(entry: DirectoryEntry, config: &LdapConfig) -> FederatedIdentity {
    let username = first_of(
        &entry,
        &[config.username_attr.as_str(), "uid", "sAMAccountName", "cn"],
    );
    let email = first_of(&entry, &[config.email_attr.as_str(), "mail"]);
    let display_name = first_of(&entry, &[config.display_name_attr.as_str(), "displayName", "cn"]);

    let group_attr = if config.group_member_attr.is_empty() {
        "memberOf"
    } else {
        config.group_member_attr.as_str()
    };
    let groups = entry.values(group_attr).to_vec();

    FederatedIdentity {
        provider: Some(ProviderKind::Ldap),
        subject: entry.dn.clone(),
        username,
        email,
        email_verified: false,
        display_name,
        first_name: entry.first("givenName").map(str::to_string),
        last_name: entry.first("sn").map(str::to_string),
        phone: entry.first("telephoneNumber").map(str::to_string),
        groups,
        dn: Some(entry.dn),
        attributes: entry.attrs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_filter_escapes_every_occurrence() {
        assert_eq!(
            fill_filter("(|(uid=%s)(mail=%s))", "a*b"),
            "(|(uid=a\\2ab)(mail=a\\2ab))"
        );
        assert_eq!(
            fill_filter("(uid=%s)", "x)(uid=*"),
            "(uid=x\\29\\28uid=\\2a)"
        );
    }

    #[test]
    fn test_default_attributes() {
        assert_eq!(user_attributes(&LdapConfig::default()), vec!["*"]);
    }

    #[test]
    fn test_active_directory_fallbacks() {
        let entry = DirectoryEntry::new("CN=Bob Smith,OU=Users,DC=corp,DC=local")
            .with_attr("sAMAccountName", "bsmith")
            .with_attr("cn", "Bob Smith")
            .with_attr("mail", "bob@corp.local")
            .with_attr("givenName", "Bob")
            .with_attr("sn", "Smith")
            .with_attr("memberOf", "CN=Admins,DC=corp,DC=local");

        let identity = entry_to_identity(entry, &LdapConfig::default());

        assert_eq!(identity.provider, Some(ProviderKind::Ldap));
        assert_eq!(identity.username.as_deref(), Some("bsmith"));
        assert_eq!(identity.display_name.as_deref(), Some("Bob Smith"));
        assert_eq!(identity.email.as_deref(), Some("bob@corp.local"));
        assert_eq!(identity.first_name.as_deref(), Some("Bob"));
        assert_eq!(identity.groups, vec!["CN=Admins,DC=corp,DC=local"]);
        assert_eq!(
            identity.dn.as_deref(),
            Some("CN=Bob Smith,OU=Users,DC=corp,DC=local")
        );
        assert!(!identity.email_verified);
    }

    #[test]
    fn test_configured_attributes_win() {
        let config = LdapConfig {
            username_attr: "employeeNumber".to_string(),
            email_attr: "userPrincipalName".to_string(),
            group_member_attr: "groups".to_string(),
            ..LdapConfig::default()
        };
        let entry = DirectoryEntry::new("uid=carol,dc=example,dc=com")
            .with_attr("uid", "carol")
            .with_attr("employeeNumber", "E100")
            .with_attr("userPrincipalName", "carol@example.com")
            .with_attr("mail", "other@example.com")
            .with_attr("groups", "staff")
            .with_attr("memberOf", "ignored");

        let identity = entry_to_identity(entry, &config);
        assert_eq!(identity.username.as_deref(), Some("E100"));
        assert_eq!(identity.email.as_deref(), Some("carol@example.com"));
        assert_eq!(identity.groups, vec!["staff"]);
    }

    #[test]
    fn test_configured_attribute_missing_falls_back() {
        let config = LdapConfig {
            username_attr: "employeeNumber".to_string(),
            ..LdapConfig::default()
        };
        let entry = DirectoryEntry::new("uid=dave,dc=example,dc=com").with_attr("uid", "dave");
        let identity = entry_to_identity(entry, &config);
        assert_eq!(identity.username.as_deref(), Some("dave"));
        assert_eq!(identity.display_name, None);
    }
}
