use packsmith_core::api::UserId;

#[derive(sqlx::FromRow)]
pub struct User {
    pub id: UserId,
}

impl User {
    pub async fn insert<'a, E>(username: &str, api_token: &str, exec: E) -> Result<UserId, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_scalar("INSERT INTO users (username, api_token) VALUES ($1, $2) RETURNING id")
            .bind(username)
            .bind(api_token)
            .fetch_one(exec)
            .await
    }

    pub async fn get_by_token<'a, E>(api_token: &str, exec: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_as(
            "SELECT id FROM users WHERE api_token = $1 LIMIT 1",
        )
        .bind(api_token)
        .fetch_optional(exec)
        .await
    }

    pub async fn get_username<'a, E>(id: UserId, exec: E) -> Result<Option<String>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(exec)
            .await
    }
}
