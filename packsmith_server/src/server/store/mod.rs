//! Ownership-scoped persistence of the modpack aggregate.
//!
//! Every method is one transaction. Ownership mismatches are reported as
//! [`ApiError::NotFound`], exactly like missing ids.

use async_trait::async_trait;
use packsmith_core::{
    api::{ModpackId, UserId},
    models::modpacks::{Modpack, ModpackAggregate, ModpackDraft},
};

use super::error::ApiError;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgModpackStore;

#[async_trait]
pub trait ModpackStore: Send + Sync {
    /// Inserts the header and all references, or nothing.
    async fn create(&self, owner: UserId, draft: ModpackDraft) -> Result<ModpackId, ApiError>;

    async fn get(&self, id: ModpackId, owner: UserId) -> Result<ModpackAggregate, ApiError>;

    /// Replaces header fields and the whole reference set under a lock on
    /// the header row.
    async fn update(
        &self,
        id: ModpackId,
        owner: UserId,
        draft: ModpackDraft,
    ) -> Result<(), ApiError>;

    async fn delete(&self, id: ModpackId, owner: UserId) -> Result<(), ApiError>;

    /// Headers only, newest first.
    async fn list(&self, owner: UserId) -> Result<Vec<Modpack>, ApiError>;

    /// Display name written as the manifest author.
    async fn display_name(&self, owner: UserId) -> Result<String, ApiError>;
}
