use packsmith_core::{
    api::{ModpackId, UserId},
    models::modpacks::ModpackDraft,
};

#[derive(sqlx::FromRow)]
pub struct Modpack {
    pub id: ModpackId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub game_version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Modpack {
    pub async fn insert<'a, E>(
        owner: UserId,
        draft: &ModpackDraft,
        exec: E,
    ) -> Result<ModpackId, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_scalar(
            "INSERT INTO modpacks (owner_id, name, description, game_version, created_at)
            VALUES ($1, $2, $3, $4, clock_timestamp())
            RETURNING id",
        )
        .bind(owner)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.game_version)
        .fetch_one(exec)
        .await
    }

    pub async fn get_owned<'a, E>(
        id: ModpackId,
        owner: UserId,
        exec: E,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_as(
            "SELECT id, owner_id, name, description, game_version, created_at
            FROM modpacks WHERE id = $1 AND owner_id = $2 LIMIT 1",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(exec)
        .await
    }

    /// Takes a row lock on the header, held until the surrounding
    /// transaction ends. Returns `None` when the id/owner pair matches nothing.
    pub async fn lock_owned<'a, E>(
        id: ModpackId,
        owner: UserId,
        exec: E,
    ) -> Result<Option<ModpackId>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_scalar("SELECT id FROM modpacks WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id)
            .bind(owner)
            .fetch_optional(exec)
            .await
    }

    pub async fn update_header<'a, E>(
        id: ModpackId,
        draft: &ModpackDraft,
        exec: E,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query(
            "UPDATE modpacks SET name = $1, description = $2, game_version = $3 WHERE id = $4",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.game_version)
        .bind(id)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn list_by_owner<'a, E>(owner: UserId, exec: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_as(
            "SELECT id, owner_id, name, description, game_version, created_at
            FROM modpacks WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC",
        )
        .bind(owner)
        .fetch_all(exec)
        .await
    }

    /// References go with the header through `ON DELETE CASCADE`.
    pub async fn delete<'a, E>(id: ModpackId, exec: E) -> Result<u64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        let result = sqlx::query("DELETE FROM modpacks WHERE id = $1")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(result.rows_affected())
    }
}

impl From<Modpack> for packsmith_core::models::modpacks::Modpack {
    fn from(x: Modpack) -> Self {
        Self {
            id: x.id,
            owner: x.owner_id,
            name: x.name,
            description: x.description,
            game_version: x.game_version,
            created_at: x.created_at,
        }
    }
}
