//! Catalog management for games, rally types and events.

use std::sync::Arc;

use shared::validation::validate_catalog_name;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{CatalogEntryChanges, NewCatalogEntry, RallyEvent, RallyGame, RallyType};
use crate::stores::CatalogStore;

pub const MSG_GAME_NOT_FOUND: &str = "Rally game not found";
pub const MSG_TYPE_NOT_FOUND: &str = "Rally type not found";
pub const MSG_EVENT_NOT_FOUND: &str = "Rally event not found";

const MAX_DESCRIPTION_LENGTH: usize = 2000;

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
}

fn check_name(name: &str) -> DomainResult<String> {
    validate_catalog_name(name).map_err(|e| {
        DomainError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Invalid name".to_string()),
        )
    })?;
    Ok(name.trim().to_string())
}

fn check_description(description: Option<String>) -> DomainResult<Option<String>> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LENGTH => Err(DomainError::validation(
            "Description must be at most 2000 characters long",
        )),
        other => Ok(other),
    }
}

fn check_entry(entry: NewCatalogEntry) -> DomainResult<NewCatalogEntry> {
    Ok(NewCatalogEntry {
        name: check_name(&entry.name)?,
        description: check_description(entry.description)?,
    })
}

fn check_changes(changes: CatalogEntryChanges) -> DomainResult<CatalogEntryChanges> {
    if changes.is_empty() {
        return Err(DomainError::validation("No changes supplied"));
    }
    Ok(CatalogEntryChanges {
        name: changes.name.as_deref().map(check_name).transpose()?,
        description: check_description(changes.description)?,
        is_active: changes.is_active,
    })
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn create_game(&self, entry: NewCatalogEntry) -> DomainResult<RallyGame> {
        let game = self.catalog.create_game(check_entry(entry)?).await?;
        tracing::info!(game_id = %game.id, name = %game.name, "Rally game created");
        Ok(game)
    }

    pub async fn get_game(&self, id: Uuid) -> DomainResult<RallyGame> {
        self.catalog
            .find_game(id)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_GAME_NOT_FOUND))
    }

    pub async fn list_games(&self, active_only: bool) -> DomainResult<Vec<RallyGame>> {
        self.catalog.list_games(active_only).await
    }

    pub async fn update_game(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<RallyGame> {
        self.catalog
            .update_game(id, check_changes(changes)?)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_GAME_NOT_FOUND))
    }

    /// Hard delete; refused while types, events or rallies reference the game.
    pub async fn delete_game(&self, id: Uuid) -> DomainResult<()> {
        if !self.catalog.delete_game(id).await? {
            return Err(DomainError::not_found(MSG_GAME_NOT_FOUND));
        }
        tracing::info!(game_id = %id, "Rally game deleted");
        Ok(())
    }

    pub async fn create_type(
        &self,
        game_id: Uuid,
        entry: NewCatalogEntry,
    ) -> DomainResult<RallyType> {
        let entry = check_entry(entry)?;
        self.get_game(game_id).await?;
        let rally_type = self.catalog.create_type(game_id, entry).await?;
        tracing::info!(type_id = %rally_type.id, game_id = %game_id, "Rally type created");
        Ok(rally_type)
    }

    pub async fn list_types(&self, game_id: Uuid, active_only: bool) -> DomainResult<Vec<RallyType>> {
        self.get_game(game_id).await?;
        self.catalog.list_types(game_id, active_only).await
    }

    pub async fn update_type(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<RallyType> {
        self.catalog
            .update_type(id, check_changes(changes)?)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_TYPE_NOT_FOUND))
    }

    /// Hard delete; refused while any rally uses the type.
    pub async fn delete_type(&self, id: Uuid) -> DomainResult<()> {
        if !self.catalog.delete_type(id).await? {
            return Err(DomainError::not_found(MSG_TYPE_NOT_FOUND));
        }
        tracing::info!(type_id = %id, "Rally type deleted");
        Ok(())
    }

    pub async fn create_event(
        &self,
        game_id: Uuid,
        entry: NewCatalogEntry,
    ) -> DomainResult<RallyEvent> {
        let entry = check_entry(entry)?;
        self.get_game(game_id).await?;
        let event = self.catalog.create_event(game_id, entry).await?;
        tracing::info!(event_id = %event.id, game_id = %game_id, "Rally event created");
        Ok(event)
    }

    pub async fn list_events(
        &self,
        game_id: Uuid,
        active_only: bool,
    ) -> DomainResult<Vec<RallyEvent>> {
        self.get_game(game_id).await?;
        self.catalog.list_events(game_id, active_only).await
    }

    pub async fn update_event(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<RallyEvent> {
        self.catalog
            .update_event(id, check_changes(changes)?)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_EVENT_NOT_FOUND))
    }

    /// Hard delete; refused while any rally uses the event.
    pub async fn delete_event(&self, id: Uuid) -> DomainResult<()> {
        if !self.catalog.delete_event(id).await? {
            return Err(DomainError::not_found(MSG_EVENT_NOT_FOUND));
        }
        tracing::info!(event_id = %id, "Rally event deleted");
        Ok(())
    }
}
