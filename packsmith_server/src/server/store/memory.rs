use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use async_trait::async_trait;
use packsmith_core::{
    api::{ModpackId, UserId},
    models::modpacks::{Modpack, ModpackAggregate, ModpackDraft},
};
use tokio::sync::{RwLock, RwLockWriteGuard};

use super::ModpackStore;
use crate::server::error::ApiError;

/// In-process store with the same contract as the Postgres one. A single
/// writer lock stands in for the header row lock.
pub struct MemoryModpackStore {
    state: RwLock<MemoryState>,
    lock_timeout: Duration,
}

#[derive(Default)]
pub struct MemoryState {
    next_modpack: i64,
    next_user: i64,
    users: HashMap<UserId, String>,
    modpacks: BTreeMap<ModpackId, ModpackAggregate>,
}

impl MemoryModpackStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            lock_timeout,
        }
    }

    pub async fn add_user(&self, username: &str) -> UserId {
        let mut state = self.state.write().await;
        state.next_user += 1;
        let id = UserId(state.next_user);
        state.users.insert(id, username.to_string());
        id
    }

    /// Holds the writer lock, for exercising lock timeouts.
    pub async fn hold_lock(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().await
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, ApiError> {
        tokio::time::timeout(self.lock_timeout, self.state.write())
            .await
            .map_err(|_| ApiError::LockTimeout)
    }
}

fn owned<'a>(
    state: &'a mut MemoryState,
    id: ModpackId,
    owner: UserId,
) -> Result<&'a mut ModpackAggregate, ApiError> {
    state
        .modpacks
        .get_mut(&id)
        .filter(|x| x.modpack.owner == owner)
        .ok_or(ApiError::NotFound)
}

#[async_trait]
impl ModpackStore for MemoryModpackStore {
    async fn create(&self, owner: UserId, draft: ModpackDraft) -> Result<ModpackId, ApiError> {
        let draft = draft.validated()?;
        let mut state = self.write().await?;
        state.next_modpack += 1;
        let id = ModpackId(state.next_modpack);
        let mut mods = draft.mods;
        mods.sort_by_key(|x| x.project_id);
        state.modpacks.insert(
            id,
            ModpackAggregate {
                modpack: Modpack {
                    id,
                    owner,
                    name: draft.name,
                    description: draft.description,
                    game_version: draft.game_version,
                    created_at: chrono::Utc::now(),
                },
                mods,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: ModpackId, owner: UserId) -> Result<ModpackAggregate, ApiError> {
        let state = self.state.read().await;
        state
            .modpacks
            .get(&id)
            .filter(|x| x.modpack.owner == owner)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn update(
        &self,
        id: ModpackId,
        owner: UserId,
        draft: ModpackDraft,
    ) -> Result<(), ApiError> {
        let draft = draft.validated()?;
        let mut state = self.write().await?;
        let aggregate = owned(&mut state, id, owner)?;
        aggregate.modpack.name = draft.name;
        aggregate.modpack.description = draft.description;
        aggregate.modpack.game_version = draft.game_version;
        aggregate.mods = draft.mods;
        aggregate.mods.sort_by_key(|x| x.project_id);
        Ok(())
    }

    async fn delete(&self, id: ModpackId, owner: UserId) -> Result<(), ApiError> {
        let mut state = self.write().await?;
        owned(&mut state, id, owner)?;
        state.modpacks.remove(&id);
        Ok(())
    }

    async fn list(&self, owner: UserId) -> Result<Vec<Modpack>, ApiError> {
        let state = self.state.read().await;
        let mut modpacks: Vec<Modpack> = state
            .modpacks
            .values()
            .filter(|x| x.modpack.owner == owner)
            .map(|x| x.modpack.clone())
            .collect();
        modpacks.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(modpacks)
    }

    async fn display_name(&self, owner: UserId) -> Result<String, ApiError> {
        let state = self.state.read().await;
        state.users.get(&owner).cloned().ok_or(ApiError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use packsmith_core::models::modpacks::ModReference;

    use super::*;

    fn draft(mods: &[(i64, i64)]) -> ModpackDraft {
        ModpackDraft {
            name: "Tech Pack".to_string(),
            description: Some("Machines".to_string()),
            game_version: "1.20.1".to_string(),
            mods: mods
                .iter()
                .map(|(project_id, file_id)| ModReference {
                    project_id: *project_id,
                    file_id: *file_id,
                    required: true,
                })
                .collect(),
        }
    }

    fn store() -> MemoryModpackStore {
        MemoryModpackStore::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn create_rejects_blank_fields_and_duplicates() {
        let store = store();
        let owner = store.add_user("alice").await;

        let mut blank = draft(&[]);
        blank.name = " ".to_string();
        assert!(matches!(
            store.create(owner, blank).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            store.create(owner, draft(&[(1, 1), (1, 2)])).await,
            Err(ApiError::Conflict(_))
        ));
        assert!(store.list(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_with_empty_set_clears_references() {
        let store = store();
        let owner = store.add_user("alice").await;
        let id = store.create(owner, draft(&[(1, 10), (2, 20)])).await.unwrap();

        let mut replacement = draft(&[]);
        replacement.name = "Renamed".to_string();
        store.update(id, owner, replacement).await.unwrap();

        let aggregate = store.get(id, owner).await.unwrap();
        assert!(aggregate.mods.is_empty());
        assert_eq!(aggregate.modpack.name, "Renamed");
    }

    #[tokio::test]
    async fn update_replaces_rather_than_merges() {
        let store = store();
        let owner = store.add_user("alice").await;
        let id = store.create(owner, draft(&[(1, 10), (2, 20)])).await.unwrap();

        store.update(id, owner, draft(&[(3, 30)])).await.unwrap();
        let mods = store.get(id, owner).await.unwrap().mods;
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].project_id, 3);
    }

    #[tokio::test]
    async fn foreign_owner_sees_not_found_and_changes_nothing() {
        let store = store();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let id = store.create(alice, draft(&[(1, 10)])).await.unwrap();
        let before = store.get(id, alice).await.unwrap();

        assert!(matches!(store.get(id, bob).await, Err(ApiError::NotFound)));
        assert!(matches!(
            store.update(id, bob, draft(&[])).await,
            Err(ApiError::NotFound)
        ));
        assert!(matches!(store.delete(id, bob).await, Err(ApiError::NotFound)));
        assert_eq!(store.get(id, alice).await.unwrap(), before);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = store();
        let owner = store.add_user("alice").await;
        let id = store.create(owner, draft(&[(1, 10)])).await.unwrap();

        store.delete(id, owner).await.unwrap();
        assert!(matches!(store.get(id, owner).await, Err(ApiError::NotFound)));
        assert!(matches!(store.delete(id, owner).await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped_to_owner() {
        let store = store();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let first = store.create(alice, draft(&[])).await.unwrap();
        let second = store.create(alice, draft(&[])).await.unwrap();
        store.create(bob, draft(&[])).await.unwrap();

        let ids: Vec<ModpackId> = store
            .list(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|x| x.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn writers_give_up_after_lock_timeout() {
        let store = store();
        let owner = store.add_user("alice").await;
        let id = store.create(owner, draft(&[(1, 10)])).await.unwrap();

        let guard = store.hold_lock().await;
        assert!(matches!(
            store.update(id, owner, draft(&[])).await,
            Err(ApiError::LockTimeout)
        ));
        drop(guard);
        assert_eq!(store.get(id, owner).await.unwrap().mods.len(), 1);
    }

    // Only checks the contract of this backend, whose writes hold a single
    // lock with no await inside. Row-lock interleaving is exercised by
    // `concurrent_updates_never_interleave` in the postgres store.
    #[tokio::test]
    async fn concurrent_updates_leave_a_complete_set() {
        let store = Arc::new(store());
        let owner = store.add_user("alice").await;
        let id = store.create(owner, draft(&[(1, 10)])).await.unwrap();

        let mut handles = Vec::new();
        for round in 0..20i64 {
            let writer = store.clone();
            let size = if round % 2 == 0 { 3 } else { 40 };
            let mods: Vec<(i64, i64)> = (1..=size).map(|x| (x, x + round)).collect();
            handles.push(tokio::spawn(async move {
                writer.update(id, owner, draft(&mods)).await.unwrap();
            }));
            let reader = store.clone();
            handles.push(tokio::spawn(async move {
                let count = reader.get(id, owner).await.unwrap().mods.len();
                assert!([1, 3, 40].contains(&count));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let count = store.get(id, owner).await.unwrap().mods.len();
        assert!(count == 3 || count == 40);
    }
}
