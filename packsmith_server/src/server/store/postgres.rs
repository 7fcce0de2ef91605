use std::time::Duration;

use async_trait::async_trait;
use packsmith_core::{
    api::{ModpackId, UserId},
    models::modpacks::{Modpack, ModpackAggregate, ModpackDraft},
};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use super::ModpackStore;
use crate::server::{
    error::ApiError,
    models::{self, references::ModReferenceRow, users::User},
};

const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";

pub struct PgModpackStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgModpackStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Opens a transaction whose lock waits give up after `lock_timeout`.
    async fn begin_write(&self) -> Result<Transaction<'static, Postgres>, ApiError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        Ok(tx)
    }
}

/// Sorts database failures into the error taxonomy. Anything unrecognized
/// is a transaction failure.
pub fn classify(err: sqlx::Error) -> ApiError {
    let code = err
        .as_database_error()
        .and_then(|x| x.code())
        .map(|x| x.into_owned());
    match code.as_deref() {
        Some(LOCK_NOT_AVAILABLE) => ApiError::LockTimeout,
        Some(UNIQUE_VIOLATION) => ApiError::Conflict(err.to_string()),
        _ => ApiError::Transaction(err),
    }
}

#[async_trait]
impl ModpackStore for PgModpackStore {
    async fn create(&self, owner: UserId, draft: ModpackDraft) -> Result<ModpackId, ApiError> {
        let draft = draft.validated()?;

        let mut tx = self.begin_write().await?;
        let id = models::modpacks::Modpack::insert(owner, &draft, &mut *tx)
            .await
            .map_err(classify)?;
        ModReferenceRow::insert_all(id, &draft.mods, &mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        info!(
            "Created modpack {} for user {} with {} mods",
            id,
            owner,
            draft.mods.len()
        );
        Ok(id)
    }

    async fn get(&self, id: ModpackId, owner: UserId) -> Result<ModpackAggregate, ApiError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        // Header and references must come from the same snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        let modpack = models::modpacks::Modpack::get_owned(id, owner, &mut *tx)
            .await
            .map_err(classify)?
            .ok_or(ApiError::NotFound)?;
        let mods = ModReferenceRow::get_by_modpack(id, &mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        Ok(ModpackAggregate {
            modpack: modpack.into(),
            mods,
        })
    }

    async fn update(
        &self,
        id: ModpackId,
        owner: UserId,
        draft: ModpackDraft,
    ) -> Result<(), ApiError> {
        let draft = draft.validated()?;

        let mut tx = self.begin_write().await?;
        // Dropping `tx` on any early return rolls everything back.
        models::modpacks::Modpack::lock_owned(id, owner, &mut *tx)
            .await
            .map_err(classify)?
            .ok_or(ApiError::NotFound)?;
        models::modpacks::Modpack::update_header(id, &draft, &mut *tx)
            .await
            .map_err(classify)?;
        let removed = ModReferenceRow::delete_by_modpack(id, &mut *tx)
            .await
            .map_err(classify)?;
        ModReferenceRow::insert_all(id, &draft.mods, &mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        debug!(
            "Replaced {} mods with {} on modpack {}",
            removed,
            draft.mods.len(),
            id
        );
        Ok(())
    }

    async fn delete(&self, id: ModpackId, owner: UserId) -> Result<(), ApiError> {
        let mut tx = self.begin_write().await?;
        models::modpacks::Modpack::lock_owned(id, owner, &mut *tx)
            .await
            .map_err(classify)?
            .ok_or(ApiError::NotFound)?;
        models::modpacks::Modpack::delete(id, &mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        info!("Deleted modpack {} of user {}", id, owner);
        Ok(())
    }

    async fn list(&self, owner: UserId) -> Result<Vec<Modpack>, ApiError> {
        let modpacks = models::modpacks::Modpack::list_by_owner(owner, &self.pool)
            .await
            .map_err(classify)?;
        Ok(modpacks.into_iter().map(|x| x.into()).collect())
    }

    async fn display_name(&self, owner: UserId) -> Result<String, ApiError> {
        User::get_username(owner, &self.pool)
            .await
            .map_err(classify)?
            .ok_or(ApiError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use packsmith_core::models::modpacks::ModReference;

    use super::*;

    async fn user(pool: &PgPool, name: &str) -> UserId {
        User::insert(name, &format!("{name}-token"), pool)
            .await
            .unwrap()
    }

    fn draft(mods: &[(i64, i64)]) -> ModpackDraft {
        ModpackDraft {
            name: "Tech Pack".to_string(),
            description: None,
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

    fn store(pool: PgPool) -> PgModpackStore {
        PgModpackStore::new(pool, Duration::from_secs(5))
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn create_get_delete(pool: PgPool) {
        let owner = user(&pool, "alice").await;
        let store = store(pool);

        let id = store.create(owner, draft(&[(10, 100), (11, 110)])).await.unwrap();
        let aggregate = store.get(id, owner).await.unwrap();
        assert_eq!(aggregate.mods.len(), 2);
        assert_eq!(aggregate.modpack.owner, owner);

        store.delete(id, owner).await.unwrap();
        assert!(matches!(store.get(id, owner).await, Err(ApiError::NotFound)));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn duplicate_projects_write_nothing(pool: PgPool) {
        let owner = user(&pool, "alice").await;
        let store = store(pool.clone());

        let result = store.create(owner, draft(&[(10, 100), (10, 101)])).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM modpacks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn foreign_update_is_not_found(pool: PgPool) {
        let alice = user(&pool, "alice").await;
        let bob = user(&pool, "bob").await;
        let store = store(pool);

        let id = store.create(alice, draft(&[(10, 100)])).await.unwrap();
        let before = store.get(id, alice).await.unwrap();
        let result = store.update(id, bob, draft(&[])).await;
        assert!(matches!(result, Err(ApiError::NotFound)));
        assert_eq!(store.get(id, alice).await.unwrap(), before);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_updates_never_interleave(pool: PgPool) {
        let owner = user(&pool, "alice").await;
        let store = Arc::new(store(pool));
        let id = store.create(owner, draft(&[(1, 1)])).await.unwrap();

        const SMALL: usize = 3;
        const LARGE: usize = 51;
        let small: Vec<(i64, i64)> = (1..=3).map(|x| (x, x)).collect();
        let large: Vec<(i64, i64)> = (100..=150).map(|x| (x, x)).collect();
        let mut handles = Vec::new();
        for round in 0..10 {
            let writer = store.clone();
            let mods = if round % 2 == 0 { small.clone() } else { large.clone() };
            handles.push(tokio::spawn(async move {
                writer.update(id, owner, draft(&mods)).await.unwrap();
            }));
            let reader = store.clone();
            handles.push(tokio::spawn(async move {
                let count = reader.get(id, owner).await.unwrap().mods.len();
                assert!(count == 1 || count == SMALL || count == LARGE);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let count = store.get(id, owner).await.unwrap().mods.len();
        assert!(count == SMALL || count == LARGE);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn list_is_newest_first(pool: PgPool) {
        let owner = user(&pool, "alice").await;
        let store = store(pool);

        assert!(store.list(owner).await.unwrap().is_empty());
        let first = store.create(owner, draft(&[])).await.unwrap();
        let second = store.create(owner, draft(&[])).await.unwrap();
        let ids: Vec<ModpackId> = store
            .list(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|x| x.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }
}
