//! Typed record collections over a key-value backend.

use led_types::{Collection, KvStore, Record, StoreError, User, SESSION_FLAG_KEY, SESSION_USER_KEY};
use tokio::sync::Mutex;

/// Typed access to the five record collections and the session keys.
///
/// Every collection lives under one key and is read and written as a whole list. All
/// writes go through a single writer lock, so a read-modify-write done with
/// [`RecordStore::mutate`] cannot lose a concurrent caller's update. Plain reads do not
/// take the lock.
pub struct RecordStore<S> {
    kv: S,
    write_lock: Mutex<()>,
}

impl<S: KvStore> RecordStore<S> {
    pub fn new(kv: S) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    pub(crate) async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    async fn read<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let key = T::COLLECTION.storage_key();
        match self.kv.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn encode<T: Record>(items: &[T]) -> Result<String, StoreError> {
        serde_json::to_string(items).map_err(|e| StoreError::Other(e.to_string()))
    }

    async fn write<T: Record>(&self, items: &[T]) -> Result<(), StoreError> {
        let raw = Self::encode(items)?;
        self.kv.set(T::COLLECTION.storage_key(), &raw).await
    }

    /// All records of `T` in insertion order; empty if the collection was never written.
    pub async fn get_all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.read().await
    }

    pub async fn find<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        let items: Vec<T> = self.read().await?;
        Ok(items.into_iter().find(|item| item.id() == id))
    }

    /// Replace the whole collection.
    pub async fn save_all<T: Record>(&self, items: &[T]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write(items).await
    }

    pub async fn add<T: Record>(&self, item: T) -> Result<(), StoreError> {
        self.mutate(|items: &mut Vec<T>| {
            items.push(item);
            Ok::<_, StoreError>(())
        })
        .await
    }

    /// Replace the record with the same id. Returns `false` (and writes nothing) if absent.
    pub async fn update<T: Record>(&self, item: T) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.read().await?;
        let Some(pos) = items.iter().position(|existing| existing.id() == item.id()) else {
            return Ok(false);
        };
        items[pos] = item;
        self.write(&items).await?;
        Ok(true)
    }

    /// Remove the record with `id`. Returns `false` (and writes nothing) if absent.
    pub async fn delete<T: Record>(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.read().await?;
        let before = items.len();
        items.retain(|item| item.id() != id);
        if items.len() == before {
            return Ok(false);
        }
        self.write(&items).await?;
        Ok(true)
    }

    /// Atomic read-modify-write of one collection.
    ///
    /// `f` runs under the writer lock. If it returns `Err`, nothing is written.
    pub async fn mutate<T, R, E, F>(&self, f: F) -> Result<R, E>
    where
        T: Record,
        F: FnOnce(&mut Vec<T>) -> Result<R, E> + Send,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.read().await?;
        let out = f(&mut items)?;
        self.write(&items).await?;
        Ok(out)
    }

    /// Erase every collection and the active session.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        for collection in Collection::ALL {
            self.kv.remove(collection.storage_key()).await?;
        }
        self.kv.remove(SESSION_USER_KEY).await?;
        self.kv.remove(SESSION_FLAG_KEY).await?;
        Ok(())
    }

    /// The persisted session user, if the authenticated flag is set.
    pub async fn load_session(&self) -> Result<Option<User>, StoreError> {
        let flag = self.kv.get(SESSION_FLAG_KEY).await?;
        if flag.as_deref() != Some("true") {
            return Ok(None);
        }
        match self.kv.get(SESSION_USER_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: SESSION_USER_KEY.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub async fn save_session(&self, user: &User) -> Result<(), StoreError> {
        let raw = serde_json::to_string(user).map_err(|e| StoreError::Other(e.to_string()))?;
        self.kv
            .set_many(&[
                (SESSION_USER_KEY, raw),
                (SESSION_FLAG_KEY, "true".to_string()),
            ])
            .await
    }

    pub async fn clear_session(&self) -> Result<(), StoreError> {
        self.kv.remove(SESSION_USER_KEY).await?;
        self.kv.remove(SESSION_FLAG_KEY).await
    }
}
