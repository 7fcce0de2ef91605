use packsmith_core::{api::ModpackId, models::modpacks::ModReference};

#[derive(sqlx::FromRow)]
pub struct ModReferenceRow {
    pub project_id: i64,
    pub file_id: i64,
    pub required: bool,
}

impl ModReferenceRow {
    pub async fn get_by_modpack<'a, E>(
        modpack_id: ModpackId,
        exec: E,
    ) -> Result<Vec<ModReference>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        let rows: Vec<Self> = sqlx::query_as(
            "SELECT project_id, file_id, required
            FROM modpack_mods WHERE modpack_id = $1 ORDER BY project_id",
        )
        .bind(modpack_id)
        .fetch_all(exec)
        .await?;
        Ok(rows.into_iter().map(|x| x.into()).collect())
    }

    /// Inserts the whole set in one statement.
    pub async fn insert_all<'a, E>(
        modpack_id: ModpackId,
        mods: &[ModReference],
        exec: E,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        if mods.is_empty() {
            return Ok(());
        }
        let project_ids: Vec<i64> = mods.iter().map(|x| x.project_id).collect();
        let file_ids: Vec<i64> = mods.iter().map(|x| x.file_id).collect();
        let required: Vec<bool> = mods.iter().map(|x| x.required).collect();
        sqlx::query(
            "INSERT INTO modpack_mods (modpack_id, project_id, file_id, required)
            SELECT $1::int8, * FROM UNNEST($2::int8[], $3::int8[], $4::bool[])",
        )
        .bind(modpack_id)
        .bind(&project_ids)
        .bind(&file_ids)
        .bind(&required)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn delete_by_modpack<'a, E>(modpack_id: ModpackId, exec: E) -> Result<u64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        let result = sqlx::query("DELETE FROM modpack_mods WHERE modpack_id = $1")
            .bind(modpack_id)
            .execute(exec)
            .await?;
        Ok(result.rows_affected())
    }
}

impl From<ModReferenceRow> for ModReference {
    fn from(x: ModReferenceRow) -> Self {
        Self {
            project_id: x.project_id,
            file_id: x.file_id,
            required: x.required,
        }
    }
}
