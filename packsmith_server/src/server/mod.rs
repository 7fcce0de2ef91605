use std::{sync::Arc, time::Duration};

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRef, FromRequestParts, Multipart, Path, State},
    http::{header, request::Parts},
    response::IntoResponse,
    routing::{get, post},
    Json, RequestPartsExt, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use clap::Parser;
use config::ServerConfig;
use error::ApiError;
use models::users::User;
use packsmith_core::api::{
    ModpackCreateBody, ModpackCreateResponse, ModpackId, ModpackImportResponse,
    ModpackListResponse, ModpackResponse, ModpackUpdateBody, UserCreateBody, UserCreateResponse,
    UserId,
};
use serde::{Deserialize, Serialize};
use service::ImportExportService;
use sqlx::{postgres::PgPoolOptions, PgPool};
use store::{ModpackStore, PgModpackStore};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

mod config;
mod error;
mod models;
mod service;
mod store;

/// Packsmith server
#[derive(Parser, Debug)]
pub struct ServeCommand {}

pub struct AppState {
    pub pool: PgPool,
    pub master_key: String,
    pub modpacks: Arc<PgModpackStore>,
    pub transfer: ImportExportService<PgModpackStore>,
}

impl ServeCommand {
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!("Packsmith Server v{}", env!("CARGO_PKG_VERSION"));

        let config = ServerConfig::load()?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        let modpacks = Arc::new(PgModpackStore::new(pool.clone(), config.lock_timeout));
        let state = Arc::new(AppState {
            pool,
            master_key: config.master_key.clone(),
            modpacks: modpacks.clone(),
            transfer: ImportExportService::new(modpacks, config.archive_limits),
        });

        let app = Router::new()
            .route("/", get(|| async { "Packsmith server" }))
            .route("/users", post(user_create))
            .route("/modpacks", get(modpack_list).post(modpack_create))
            .route("/modpacks/import", post(modpack_import))
            .route("/modpacks/:modpack_id", get(modpack_get))
            .route("/modpacks/:modpack_id/update", post(modpack_update))
            .route("/modpacks/:modpack_id/delete", post(modpack_delete))
            .route("/modpacks/:modpack_id/export", get(modpack_export))
            .layer(DefaultBodyLimit::max(config.max_upload_size))
            .layer(RequestBodyLimitLayer::new(config.max_upload_size))
            .layer(TimeoutLayer::new(Duration::from_secs(15)))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
        info!("Serving on 0.0.0.0:{}", config.port);
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn user_create(
    State(state): State<Arc<AppState>>,
    _: AuthenticatedKey,
    Json(data): Json<UserCreateBody>,
) -> Result<Json<UserCreateResponse>, ApiError> {
    let username = data.username.trim();
    if username.is_empty() || username.chars().count() > 50 {
        return Err(ApiError::Validation(
            "username must be 1 to 50 characters".to_string(),
        ));
    }
    let api_token = Uuid::new_v4().simple().to_string();
    let user_id = User::insert(username, &api_token, &state.pool)
        .await
        .map_err(store::postgres::classify)?;
    info!("Created user {} ({})", username, user_id);
    Ok(Json(UserCreateResponse {
        user_id,
        username: username.to_string(),
        api_token,
    }))
}

async fn modpack_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<ModpackListResponse>, ApiError> {
    let modpacks = state.modpacks.list(user.id).await?;
    Ok(Json(ModpackListResponse { modpacks }))
}

async fn modpack_create(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(data): Json<ModpackCreateBody>,
) -> Result<Json<ModpackCreateResponse>, ApiError> {
    let modpack_id = state.modpacks.create(user.id, data).await?;
    Ok(Json(ModpackCreateResponse { modpack_id }))
}

async fn modpack_get(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(modpack_id): Path<ModpackId>,
) -> Result<Json<ModpackResponse>, ApiError> {
    let aggregate = state.modpacks.get(modpack_id, user.id).await?;
    Ok(Json(ModpackResponse {
        modpack: aggregate.modpack,
        mods: aggregate.mods,
    }))
}

async fn modpack_update(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(modpack_id): Path<ModpackId>,
    Json(data): Json<ModpackUpdateBody>,
) -> Result<Json<GenericResponse>, ApiError> {
    state.modpacks.update(modpack_id, user.id, data).await?;
    Ok(Json(GenericResponse::new()))
}

async fn modpack_delete(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(modpack_id): Path<ModpackId>,
) -> Result<Json<GenericResponse>, ApiError> {
    state.modpacks.delete(modpack_id, user.id).await?;
    Ok(Json(GenericResponse::new()))
}

async fn modpack_export(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(modpack_id): Path<ModpackId>,
) -> Result<impl IntoResponse, ApiError> {
    let exported = state.transfer.export(modpack_id, user.id).await?;
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_LENGTH, exported.bytes.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", exported.file_name),
        ),
    ];
    Ok((headers, exported.bytes))
}

async fn modpack_import(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<ModpackImportResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let data = field.bytes().await?;
        let modpack_id = state.transfer.import(user.id, &data).await?;
        return Ok(Json(ModpackImportResponse { modpack_id }));
    }
    Err(ApiError::BadRequest)
}

#[derive(Serialize, Deserialize)]
pub struct GenericResponse {
    pub success: bool,
}

impl GenericResponse {
    pub fn new() -> Self {
        Self { success: true }
    }
}

type AxumAppState = Arc<AppState>;

async fn bearer_token(parts: &mut Parts) -> Result<String, ApiError> {
    let TypedHeader(Authorization(bearer)) = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| ApiError::Unauthorized)?;
    Ok(bearer.token().to_string())
}

/// Admin access with the server master key.
pub struct AuthenticatedKey;

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedKey
where
    AxumAppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AxumAppState::from_ref(state);
        if state.master_key != bearer_token(parts).await? {
            return Err(ApiError::Unauthorized);
        }
        Ok(AuthenticatedKey)
    }
}

/// The user owning every modpack touched by the request.
pub struct AuthenticatedUser {
    pub id: UserId,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AxumAppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AxumAppState::from_ref(state);
        let token = bearer_token(parts).await?;
        let user = User::get_by_token(&token, &state.pool)
            .await
            .map_err(store::postgres::classify)?
            .ok_or(ApiError::Unauthorized)?;
        Ok(AuthenticatedUser { id: user.id })
    }
}
