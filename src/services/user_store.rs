use std::{collections::BTreeMap, io::ErrorKind, path::{Path, PathBuf}, sync::Arc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{fs, sync::RwLock};
use crate::errors::{StoreError, StoreResult};
use crate::models::{User, UserCollection};

// Raw JSON of records that failed to read as a `User`.
type Unreadable = BTreeMap<String, Value>;

#[derive(Serialize)]
#[serde(untagged)]
enum Entry<'a> {
    User(&'a User),
    Raw(&'a Value),
}

/// JSON file holding every user record.
///
/// Each operation re-reads the file, so nothing is cached between requests.
/// `update` holds an exclusive lock across load, mutate and save; concurrent
/// mutations through the same store therefore never lose each other's writes.
pub struct UserStore {
    path: Arc<PathBuf>,
    lock: Arc<RwLock<()>>,
}

impl UserStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current collection. A missing file is an empty store.
    ///
    /// Records that do not read as a user are left out with a warning, so
    /// one damaged entry does not take every other account down with it.
    pub async fn load(&self) -> StoreResult<UserCollection> {
        Ok(self.load_entries().await?.0)
    }

    /// Replaces the store with `users`, pretty-printed.
    ///
    /// Writes a sibling temp file and renames it into place, so readers see
    /// either the old or the new collection and never a truncated one.
    pub async fn save(&self, users: &UserCollection) -> StoreResult<()> {
        self.write(users, &Unreadable::new()).await
    }

    async fn load_entries(&self) -> StoreResult<(UserCollection, Unreadable)> {
        let bytes = match fs::read(self.path.as_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No user store at {}, starting empty", self.path.display());
                return Ok(Default::default());
            }
            Err(source) => {
                tracing::error!("Error loading users data: {}", source);
                return Err(StoreError::Read { path: self.path.to_path_buf(), source });
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            tracing::warn!("User store {} is empty, treating as no users", self.path.display());
            return Ok(Default::default());
        }

        let entries: BTreeMap<String, Value> = serde_json::from_slice(&bytes).map_err(|source| {
            tracing::error!("Error parsing users data: {}", source);
            StoreError::Corrupt { path: self.path.to_path_buf(), source }
        })?;

        let mut users = UserCollection::new();
        let mut unreadable = Unreadable::new();
        for (username, raw) in entries {
            match User::deserialize(&raw) {
                Ok(user) => {
                    users.insert(username, user);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable record for {}: {}", username, e);
                    unreadable.insert(username, raw);
                }
            }
        }

        tracing::debug!("Loaded {} users from {}", users.len(), self.path.display());
        Ok((users, unreadable))
    }

    // Unreadable records are written back verbatim unless `users` now holds the name.
    async fn write(&self, users: &UserCollection, unreadable: &Unreadable) -> StoreResult<()> {
        let mut entries: BTreeMap<&str, Entry<'_>> = unreadable
            .iter()
            .map(|(name, raw)| (name.as_str(), Entry::Raw(raw)))
            .collect();
        entries.extend(users.iter().map(|(name, user)| (name.as_str(), Entry::User(user))));
        let data = serde_json::to_vec_pretty(&entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| self.write_error(source))?;
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, data).await.map_err(|source| self.write_error(source))?;
        if let Err(source) = fs::rename(&tmp_path, self.path.as_path()).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(self.write_error(source));
        }

        tracing::debug!("Saved {} users to {}", users.len(), self.path.display());
        Ok(())
    }

    /// Runs `f` against a fresh snapshot without writing anything back.
    pub async fn read<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&UserCollection) -> R,
    {
        let _guard = self.lock.read().await;
        let users = self.load().await?;
        Ok(f(&users))
    }

    /// Load, mutate, save as one exclusive step.
    ///
    /// When `f` returns an error the collection is dropped unsaved.
    pub async fn update<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut UserCollection) -> Result<R, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.write().await;
        let (mut users, unreadable) = self.load_entries().await?;
        let result = f(&mut users)?;
        self.write(&users, &unreadable).await?;
        Ok(result)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "users.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        tracing::error!("Error saving users data: {}", source);
        StoreError::Write { path: self.path.to_path_buf(), source }
    }
}

impl Clone for UserStore {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            lock: self.lock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credit, User};
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> UserStore {
        UserStore::new(dir.path().join("users.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        assert!(store.load().await?.is_empty());
        assert!(!store.path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn save_then_reload_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);

        let mut users = UserCollection::new();
        let mut alice = User::new("hash".into());
        alice.credit = Credit::from(12);
        users.insert("alice".into(), alice);
        store.save(&users).await?;

        let reloaded = UserStore::new(store.path()).load().await?;
        assert_eq!(reloaded, users);
        assert!(!dir.path().join("users.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn saved_file_is_two_space_indented() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        store
            .update(|users| {
                users.insert("bob".into(), User::new("pw".into()));
                Ok::<_, StoreError>(())
            })
            .await?;

        let text = std::fs::read_to_string(store.path())?;
        assert!(text.starts_with("{\n  \"bob\": {\n    \"password\": \"pw\""));
        Ok(())
    }

    #[tokio::test]
    async fn legacy_records_gain_credit_in_memory_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        let legacy = json!({ "carol": { "password": "pw" } }).to_string();
        std::fs::write(store.path(), &legacy)?;

        let users = store.load().await?;
        assert_eq!(users["carol"].credit, Credit::default());
        assert_eq!(std::fs::read_to_string(store.path())?, legacy);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json")?;

        assert!(matches!(store.load().await, Err(StoreError::Corrupt { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn null_credit_and_missing_password_do_not_break_the_store() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        let raw = json!({
            "alice": { "password": "pw", "credit": 0 },
            "bob": { "password": "pw", "credit": null },
            "carol": { "credit": 2 }
        });
        std::fs::write(store.path(), raw.to_string())?;

        let users = store.load().await?;
        assert_eq!(users.len(), 3);
        assert_eq!(users["bob"].credit, Credit::default());
        assert!(users["carol"].password.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_records_are_skipped_and_kept_on_rewrite() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        let raw = json!({
            "alice": { "password": "pw", "credit": 1 },
            "broken": 5,
            "odd": { "password": ["not", "a", "string"] }
        });
        std::fs::write(store.path(), raw.to_string())?;

        let users = store.load().await?;
        assert_eq!(users.keys().collect::<Vec<_>>(), vec!["alice"]);

        store
            .update(|users| {
                users.insert("dave".into(), User::new("pw".into()));
                Ok::<_, StoreError>(())
            })
            .await?;

        let on_disk: Value = serde_json::from_slice(&std::fs::read(store.path())?)?;
        assert_eq!(on_disk["broken"], json!(5));
        assert_eq!(on_disk["odd"], raw["odd"]);
        assert_eq!(on_disk["dave"]["password"], "pw");
        assert_eq!(on_disk["alice"]["credit"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn non_object_store_is_corrupt() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        std::fs::write(store.path(), "[1, 2, 3]")?;

        assert!(matches!(store.load().await, Err(StoreError::Corrupt { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn whitespace_file_loads_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        std::fs::write(store.path(), "\n  \n")?;
        assert!(store.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);

        let result = store
            .update(|users| {
                users.insert("dave".into(), User::new("pw".into()));
                Err::<(), _>(crate::errors::AppError::Conflict("nope".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(!store.path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_lose_writes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = store_in(&dir);
        store
            .update(|users| {
                users.insert("erin".into(), User::new("pw".into()));
                Ok::<_, StoreError>(())
            })
            .await?;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(|users| {
                        let user = users.get_mut("erin").expect("erin exists");
                        user.credit = user.credit.checked_add(&Credit::from(1)).expect("finite");
                        Ok::<_, StoreError>(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let credit = store.read(|users| users["erin"].credit.clone()).await?;
        assert_eq!(credit, Credit::from(20));
        Ok(())
    }
}
