//! Catalog repository: games plus the types and events scoped to them.

use async_trait::async_trait;
use domain::models::{CatalogEntryChanges, NewCatalogEntry, RallyEvent, RallyGame, RallyType};
use domain::stores::CatalogStore;
use domain::{DomainError, DomainResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{GameEntity, GameScopedEntity};
use crate::metrics::QueryTimer;

const CATALOG_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";
const SCOPED_COLUMNS: &str = "id, game_id, name, description, is_active, created_at, updated_at";

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// The two game-scoped tables share a shape and a query set.
#[derive(Clone, Copy)]
enum ScopedTable {
    Types,
    Events,
}

impl ScopedTable {
    fn name(self) -> &'static str {
        match self {
            ScopedTable::Types => "rally_types",
            ScopedTable::Events => "rally_events",
        }
    }

    fn in_use_message(self) -> &'static str {
        match self {
            ScopedTable::Types => "Rally type is used by existing rallies",
            ScopedTable::Events => "Rally event is used by existing rallies",
        }
    }
}

/// Maps a restrict violation on delete to `Conflict`; everything else goes
/// through the usual sqlx conversion.
fn delete_error(err: sqlx::Error, in_use: &str) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return DomainError::conflict(in_use);
        }
    }
    err.into()
}

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create_scoped(
        &self,
        table: ScopedTable,
        game_id: Uuid,
        entry: NewCatalogEntry,
    ) -> DomainResult<GameScopedEntity> {
        let timer = QueryTimer::new("create_catalog_entry");
        let result = sqlx::query_as::<_, GameScopedEntity>(&format!(
            r#"
            INSERT INTO {} (game_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING {SCOPED_COLUMNS}
            "#,
            table.name()
        ))
        .bind(game_id)
        .bind(&entry.name)
        .bind(&entry.description)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn find_scoped(
        &self,
        table: ScopedTable,
        id: Uuid,
    ) -> DomainResult<Option<GameScopedEntity>> {
        let timer = QueryTimer::new("find_catalog_entry");
        let result = sqlx::query_as::<_, GameScopedEntity>(&format!(
            "SELECT {SCOPED_COLUMNS} FROM {} WHERE id = $1",
            table.name()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn list_scoped(
        &self,
        table: ScopedTable,
        game_id: Uuid,
        active_only: bool,
    ) -> DomainResult<Vec<GameScopedEntity>> {
        let timer = QueryTimer::new("list_catalog_entries");
        let result = sqlx::query_as::<_, GameScopedEntity>(&format!(
            r#"
            SELECT {SCOPED_COLUMNS} FROM {}
            WHERE game_id = $1 AND (is_active OR NOT $2)
            ORDER BY name
            "#,
            table.name()
        ))
        .bind(game_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn update_scoped(
        &self,
        table: ScopedTable,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<GameScopedEntity>> {
        let timer = QueryTimer::new("update_catalog_entry");
        let result = sqlx::query_as::<_, GameScopedEntity>(&format!(
            r#"
            UPDATE {}
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SCOPED_COLUMNS}
            "#,
            table.name()
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn delete_scoped(&self, table: ScopedTable, id: Uuid) -> DomainResult<bool> {
        let timer = QueryTimer::new("delete_catalog_entry");
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table.name()))
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        let done = result.map_err(|e| delete_error(e, table.in_use_message()))?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn create_game(&self, entry: NewCatalogEntry) -> DomainResult<RallyGame> {
        let timer = QueryTimer::new("create_rally_game");
        let result = sqlx::query_as::<_, GameEntity>(&format!(
            r#"
            INSERT INTO rally_games (name, description)
            VALUES ($1, $2)
            RETURNING {CATALOG_COLUMNS}
            "#
        ))
        .bind(&entry.name)
        .bind(&entry.description)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?.into())
    }

    async fn find_game(&self, id: Uuid) -> DomainResult<Option<RallyGame>> {
        let timer = QueryTimer::new("find_rally_game");
        let result = sqlx::query_as::<_, GameEntity>(&format!(
            "SELECT {CATALOG_COLUMNS} FROM rally_games WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn list_games(&self, active_only: bool) -> DomainResult<Vec<RallyGame>> {
        let timer = QueryTimer::new("list_rally_games");
        let result = sqlx::query_as::<_, GameEntity>(&format!(
            r#"
            SELECT {CATALOG_COLUMNS} FROM rally_games
            WHERE is_active OR NOT $1
            ORDER BY name
            "#
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn update_game(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyGame>> {
        let timer = QueryTimer::new("update_rally_game");
        let result = sqlx::query_as::<_, GameEntity>(&format!(
            r#"
            UPDATE rally_games
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATALOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn delete_game(&self, id: Uuid) -> DomainResult<bool> {
        let timer = QueryTimer::new("delete_rally_game");
        let result = sqlx::query("DELETE FROM rally_games WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        let done =
            result.map_err(|e| delete_error(e, "Rally game still has types, events or rallies"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn create_type(&self, game_id: Uuid, entry: NewCatalogEntry) -> DomainResult<RallyType> {
        Ok(self.create_scoped(ScopedTable::Types, game_id, entry).await?.into())
    }

    async fn find_type(&self, id: Uuid) -> DomainResult<Option<RallyType>> {
        Ok(self.find_scoped(ScopedTable::Types, id).await?.map(Into::into))
    }

    async fn list_types(&self, game_id: Uuid, active_only: bool) -> DomainResult<Vec<RallyType>> {
        let rows = self
            .list_scoped(ScopedTable::Types, game_id, active_only)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_type(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyType>> {
        let row = self.update_scoped(ScopedTable::Types, id, changes).await?;
        Ok(row.map(Into::into))
    }

    async fn delete_type(&self, id: Uuid) -> DomainResult<bool> {
        self.delete_scoped(ScopedTable::Types, id).await
    }

    async fn create_event(
        &self,
        game_id: Uuid,
        entry: NewCatalogEntry,
    ) -> DomainResult<RallyEvent> {
        Ok(self
            .create_scoped(ScopedTable::Events, game_id, entry)
            .await?
            .into())
    }

    async fn find_events(&self, ids: &[Uuid]) -> DomainResult<Vec<RallyEvent>> {
        let timer = QueryTimer::new("find_rally_events");
        let result = sqlx::query_as::<_, GameScopedEntity>(&format!(
            "SELECT {SCOPED_COLUMNS} FROM rally_events WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn list_events(
        &self,
        game_id: Uuid,
        active_only: bool,
    ) -> DomainResult<Vec<RallyEvent>> {
        let rows = self
            .list_scoped(ScopedTable::Events, game_id, active_only)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_event(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyEvent>> {
        let row = self.update_scoped(ScopedTable::Events, id, changes).await?;
        Ok(row.map(Into::into))
    }

    async fn delete_event(&self, id: Uuid) -> DomainResult<bool> {
        self.delete_scoped(ScopedTable::Events, id).await
    }
}
