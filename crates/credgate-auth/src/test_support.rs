//! In-process doubles for the storage and directory seams, used by unit
//! tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::federation::ldap::{
    DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, SearchScope,
};
use crate::password::SecretHasher;
use crate::storage::{CredentialStore, KeyValueCache, NewUser, User};
use crate::{AuthError, AuthResult};

/// Hasher double storing `plain:<secret>`; Argon2 is exercised in the
/// password module.
pub(crate) struct PlainHasher;

impl SecretHasher for PlainHasher {
    fn hash(&self, secret: &str) -> AuthResult<String> {
        Ok(format!("plain:{}", secret))
    }

    fn verify(&self, secret: &str, hash: &str) -> AuthResult<bool> {
        Ok(hash == format!("plain:{}", secret))
    }
}

/// Key-value cache backed by a map. TTLs are recorded, never enforced.
#[derive(Default)]
pub(crate) struct MockCache {
    entries: RwLock<HashMap<String, (String, Duration)>>,
    failing: AtomicBool,
    claim_delay_ms: AtomicU64,
}

impl MockCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `CacheUnavailable`.
    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Delays every `set_nx_ex` before it touches the map, so that
    /// concurrent callers all get past their reads first.
    pub(crate) fn delay_claims(&self, delay: Duration) {
        self.claim_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.read().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> AuthResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AuthError::cache("mock cache offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueCache for MockCache {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        self.check()?;
        Ok(self.entries.read().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn exists(&self, key: &str) -> AuthResult<bool> {
        self.check()?;
        Ok(self.entries.read().unwrap().contains_key(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        self.check()?;
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<bool> {
        self.check()?;
        let delay = self.claim_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), ttl));
        Ok(true)
    }

    async fn take(&self, key: &str) -> AuthResult<Option<String>> {
        self.check()?;
        Ok(self.entries.write().unwrap().remove(key).map(|(v, _)| v))
    }

    async fn delete(&self, key: &str) -> AuthResult<bool> {
        self.check()?;
        Ok(self.entries.write().unwrap().remove(key).is_some())
    }
}

/// Credential store enforcing the same uniqueness rules as the real backends.
pub(crate) struct MockCredentialStore {
    users: RwLock<Vec<User>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    inserts: AtomicU64,
    insert_delay_ms: AtomicU64,
    racing: Mutex<Vec<NewUser>>,
    failing_lookup: Mutex<Option<&'static str>>,
}

impl MockCredentialStore {
    pub(crate) fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
            inserts: AtomicU64::new(0),
            insert_delay_ms: AtomicU64::new(0),
            racing: Mutex::new(Vec::new()),
            failing_lookup: Mutex::new(None),
        }
    }

    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Makes lookups by one key (`"username"`, `"email"` or `"phone"`) fail
    /// with `StoreUnavailable`.
    pub(crate) fn fail_lookup(&self, key: &'static str) {
        *self.failing_lookup.lock().unwrap() = Some(key);
    }

    /// Sleeps inside every `insert` before the uniqueness check.
    pub(crate) fn delay_inserts(&self, delay: Duration) {
        self.insert_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Lands `user` just before the next `insert` checks uniqueness, as if a
    /// concurrent writer got there first.
    pub(crate) fn race_next_insert(&self, user: NewUser) {
        self.racing.lock().unwrap().push(user);
    }

    pub(crate) fn insert_count(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.users.read().unwrap().len()
    }

    /// Seeds a row directly, bypassing the insert counter.
    pub(crate) fn seed(&self, user: NewUser) -> User {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = user.into_user(id, OffsetDateTime::now_utc());
        self.users.write().unwrap().push(row.clone());
        row
    }

    fn check(&self) -> AuthResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AuthError::store("mock store offline"))
        } else {
            Ok(())
        }
    }

    fn find_by_key(
        &self,
        key: &'static str,
        pred: impl Fn(&User) -> bool,
    ) -> AuthResult<Option<User>> {
        if *self.failing_lookup.lock().unwrap() == Some(key) {
            return Err(AuthError::store(format!("mock lookup by {} offline", key)));
        }
        self.find(pred)
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> AuthResult<Option<User>> {
        self.check()?;
        Ok(self.users.read().unwrap().iter().find(|u| pred(u)).cloned())
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn find_by_id(&self, id: u64) -> AuthResult<Option<User>> {
        self.find(|u| u.id == id)
    }

    async fn find_by_public_id(&self, public_id: &str) -> AuthResult<Option<User>> {
        self.find(|u| u.public_id == public_id)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        self.find_by_key("username", |u| u.username == username)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        self.find_by_key("email", |u| u.email == email)
    }

    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<User>> {
        self.find_by_key("phone", |u| u.phone.as_deref() == Some(phone))
    }

    async fn insert(&self, user: NewUser) -> AuthResult<u64> {
        self.check()?;
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let delay = self.insert_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let winner = self.racing.lock().unwrap().pop();
        if let Some(winner) = winner {
            self.seed(winner);
        }

        let mut users = self.users.write().unwrap();
        if users.iter().any(|u| {
            u.username == user.username
                || u.email == user.email
                || (user.phone.is_some() && u.phone == user.phone)
        }) {
            return Err(AuthError::provisioning_conflict(format!(
                "duplicate key for '{}'",
                user.username
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        users.push(user.into_user(id, OffsetDateTime::now_utc()));
        Ok(id)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        self.check()?;
        let mut users = self.users.write().unwrap();
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(())
            }
            None => Err(AuthError::store(format!("user {} not found", user.id))),
        }
    }

    async fn update_last_login(&self, id: u64, at: OffsetDateTime) -> AuthResult<()> {
        self.check()?;
        let mut users = self.users.write().unwrap();
        match users.iter_mut().find(|u| u.id == id) {
            Some(row) => {
                row.last_login_at = Some(at);
                Ok(())
            }
            None => Err(AuthError::store(format!("user {} not found", id))),
        }
    }
}

// =============================================================================
// Directory
// =============================================================================

#[derive(Default)]
struct DirectoryState {
    entries: Vec<DirectoryEntry>,
    passwords: HashMap<String, String>,
    service: Option<(String, String)>,
    anonymous: bool,
    binds: Vec<String>,
    filters: Vec<String>,
    connects: usize,
    unbinds: usize,
    fail_connect: bool,
    hang_search: bool,
}

/// In-memory directory. Filters match an entry when they contain
/// `(<attr>=<value>)` for one of its attribute values.
#[derive(Clone, Default)]
pub(crate) struct FakeDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl FakeDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_service(self, dn: &str, password: &str) -> Self {
        self.state.lock().unwrap().service = Some((dn.to_string(), password.to_string()));
        self
    }

    pub(crate) fn allow_anonymous(self) -> Self {
        self.state.lock().unwrap().anonymous = true;
        self
    }

    pub(crate) fn add_user(&self, entry: DirectoryEntry, password: &str) {
        let mut state = self.state.lock().unwrap();
        state.passwords.insert(entry.dn.clone(), password.to_string());
        state.entries.push(entry);
    }

    pub(crate) fn add_entry(&self, entry: DirectoryEntry) {
        self.state.lock().unwrap().entries.push(entry);
    }

    pub(crate) fn fail_connect(&self) {
        self.state.lock().unwrap().fail_connect = true;
    }

    pub(crate) fn hang_search(&self) {
        self.state.lock().unwrap().hang_search = true;
    }

    pub(crate) fn binds(&self) -> Vec<String> {
        self.state.lock().unwrap().binds.clone()
    }

    pub(crate) fn last_filter(&self) -> Option<String> {
        self.state.lock().unwrap().filters.last().cloned()
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub(crate) fn unbinds(&self) -> usize {
        self.state.lock().unwrap().unbinds
    }
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.fail_connect {
            return Err(DirectoryError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<DirectoryState>>,
}

fn matches_filter(entry: &DirectoryEntry, filter: &str) -> bool {
    entry.attrs.iter().any(|(attr, values)| {
        values
            .iter()
            .any(|value| filter.contains(&format!("({}={})", attr, value)))
    })
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.binds.push(dn.to_string());

        let accepted = if dn.is_empty() && password.is_empty() {
            state.anonymous
        } else if state.service.as_ref().is_some_and(|(d, p)| d == dn && p == password) {
            true
        } else {
            state.passwords.get(dn).is_some_and(|p| p == password)
        };

        if accepted {
            Ok(())
        } else {
            Err(DirectoryError::InvalidCredentials)
        }
    }

    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        _attrs: &[String],
        size_limit: i32,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.filters.push(filter.to_string());
            state.hang_search
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let state = self.state.lock().unwrap();
        let found = state.entries.iter().filter(|e| match scope {
            SearchScope::Base => e.dn == base,
            SearchScope::Subtree => e.dn.ends_with(base) && matches_filter(e, filter),
        });
        let limit = if size_limit > 0 {
            size_limit as usize
        } else {
            usize::MAX
        };
        Ok(found.take(limit).cloned().collect())
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        self.state.lock().unwrap().unbinds += 1;
        Ok(())
    }
}
