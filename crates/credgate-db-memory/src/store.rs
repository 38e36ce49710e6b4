//! In-memory credential store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use credgate_auth::{AuthError, AuthResult, CredentialStore, NewUser, User};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Rows plus one index per unique key. Guarded as a whole so that the
/// uniqueness check and the write happen under one lock.
#[derive(Debug, Default)]
struct UserTable {
    rows: BTreeMap<u64, User>,
    by_public_id: HashMap<String, u64>,
    by_username: HashMap<String, u64>,
    by_email: HashMap<String, u64>,
    by_phone: HashMap<String, u64>,
}

impl UserTable {
    fn lookup(&self, index: &HashMap<String, u64>, key: &str) -> Option<User> {
        index.get(key).and_then(|id| self.rows.get(id)).cloned()
    }

    /// Returns the first unique key of `user` already held by another row.
    fn conflict(
        &self,
        id: Option<u64>,
        public_id: &str,
        username: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Option<&'static str> {
        let taken = |index: &HashMap<String, u64>, key: &str| {
            index.get(key).is_some_and(|owner| Some(*owner) != id)
        };

        if taken(&self.by_public_id, public_id) {
            Some("public_id")
        } else if taken(&self.by_username, username) {
            Some("username")
        } else if taken(&self.by_email, email) {
            Some("email")
        } else if phone.is_some_and(|p| taken(&self.by_phone, p)) {
            Some("phone")
        } else {
            None
        }
    }

    fn index(&mut self, user: &User) {
        self.by_public_id.insert(user.public_id.clone(), user.id);
        self.by_username.insert(user.username.clone(), user.id);
        self.by_email.insert(user.email.clone(), user.id);
        if let Some(phone) = &user.phone {
            self.by_phone.insert(phone.clone(), user.id);
        }
    }

    fn unindex(&mut self, user: &User) {
        self.by_public_id.remove(&user.public_id);
        self.by_username.remove(&user.username);
        self.by_email.remove(&user.email);
        if let Some(phone) = &user.phone {
            self.by_phone.remove(phone);
        }
    }
}

/// Process-local [`CredentialStore`].
///
/// Enforces the same unique keys as the PostgreSQL schema: public id,
/// username, email and (when present) phone.
#[derive(Debug)]
pub struct InMemoryCredentialStore {
    table: RwLock<UserTable>,
    next_id: AtomicU64,
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCredentialStore {
    /// Creates an empty store. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(UserTable::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    /// Returns `true` if no user is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_id(&self, id: u64) -> AuthResult<Option<User>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_public_id(&self, public_id: &str) -> AuthResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table.lookup(&table.by_public_id, public_id))
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table.lookup(&table.by_username, username))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table.lookup(&table.by_email, email))
    }

    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table.lookup(&table.by_phone, phone))
    }

    async fn insert(&self, user: NewUser) -> AuthResult<u64> {
        let mut table = self.table.write().await;
        if let Some(key) = table.conflict(
            None,
            &user.public_id,
            &user.username,
            &user.email,
            user.phone.as_deref(),
        ) {
            return Err(AuthError::provisioning_conflict(format!(
                "duplicate {}",
                key
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = user.into_user(id, OffsetDateTime::now_utc());
        table.index(&row);
        table.rows.insert(id, row);
        tracing::debug!(user_id = id, "User inserted");
        Ok(id)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let mut table = self.table.write().await;
        let Some(existing) = table.rows.get(&user.id).cloned() else {
            return Err(AuthError::store(format!("user {} not found", user.id)));
        };
        if let Some(key) = table.conflict(
            Some(user.id),
            &user.public_id,
            &user.username,
            &user.email,
            user.phone.as_deref(),
        ) {
            return Err(AuthError::provisioning_conflict(format!(
                "duplicate {}",
                key
            )));
        }

        let mut row = user.clone();
        row.created_at = existing.created_at;
        row.updated_at = OffsetDateTime::now_utc();

        table.unindex(&existing);
        table.index(&row);
        table.rows.insert(row.id, row);
        Ok(())
    }

    async fn update_last_login(&self, id: u64, at: OffsetDateTime) -> AuthResult<()> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(row) => {
                row.last_login_at = Some(at);
                Ok(())
            }
            None => Err(AuthError::store(format!("user {} not found", id))),
        }
    }
}
