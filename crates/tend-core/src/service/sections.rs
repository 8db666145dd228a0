use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::{read_through, ServiceContext};
use crate::cache::EntityCache;
use crate::error::CoreError;
use crate::models::{Category, NewCategoryData, NewSectionData, Section, UpdateSectionData};
use crate::optimistic::OptimisticUpdate;
use crate::repository::Repository;

/// Sections and categories of the signed-in user.
pub struct SectionService<R: Repository> {
    ctx: ServiceContext<R>,
}

impl<R: Repository> SectionService<R> {
    pub fn new(ctx: ServiceContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn sections(&self) -> Vec<Section> {
        let result = match self.ctx.session().require_user() {
            Ok(owner) => {
                let cache = self.ctx.caches().sections.for_owner(owner);
                read_through(&cache, || self.ctx.repo().find_sections(owner)).await
            }
            Err(err) => Err(err),
        };
        self.ctx.read_or_empty("Could not load sections", result)
    }

    pub async fn categories(&self) -> Vec<Category> {
        let result = match self.ctx.session().require_user() {
            Ok(owner) => {
                let cache = self.ctx.caches().categories.for_owner(owner);
                read_through(&cache, || self.ctx.repo().find_categories(owner)).await
            }
            Err(err) => Err(err),
        };
        self.ctx.read_or_empty("Could not load categories", result)
    }

    pub async fn add_section(&self, data: NewSectionData) -> Result<Section, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().sections.for_owner(owner);
        let temp_id = Uuid::new_v4();
        let draft = Section {
            id: temp_id,
            user_id: owner,
            name: data.name.clone(),
            order: data.order.unwrap_or_else(|| cache.len() as i64),
            include_in_focus_mode: data.include_in_focus_mode.unwrap_or(true),
            revision: 0,
            created_at: Utc::now(),
        };

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not add section")
            .run(
                move |rows| rows.push(draft),
                || self.ctx.repo().add_section(owner, data),
                move |cache: &EntityCache<Section>, saved: &Section| cache.replace_id(temp_id, saved.clone()),
            )
            .await
    }

    async fn update_section(&self, id: Uuid, data: UpdateSectionData, failure: &str) -> Result<Section, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().sections.for_owner(owner);
        let local = data.clone();

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message(failure)
            .pending_update(id)
            .run(
                move |rows| {
                    if let Some(section) = rows.iter_mut().find(|s| s.id == id) {
                        if let Some(name) = local.name {
                            section.name = name;
                        }
                        if let Some(focus) = local.include_in_focus_mode {
                            section.include_in_focus_mode = focus;
                        }
                        if let Some(order) = local.order {
                            section.order = order;
                        }
                    }
                },
                || self.ctx.repo().update_section(owner, id, data),
                |cache: &EntityCache<Section>, saved: &Section| cache.upsert(saved.clone()),
            )
            .await
    }

    pub async fn rename_section(&self, id: Uuid, name: impl Into<String>) -> Result<Section, CoreError> {
        let data = UpdateSectionData {
            name: Some(name.into()),
            ..Default::default()
        };
        self.update_section(id, data, "Could not rename section").await
    }

    pub async fn set_focus_mode(&self, id: Uuid, include: bool) -> Result<Section, CoreError> {
        let data = UpdateSectionData {
            include_in_focus_mode: Some(include),
            ..Default::default()
        };
        self.update_section(id, data, "Could not update section").await
    }

    /// Deletes the section; its tasks stay, unsectioned.
    pub async fn delete_section(&self, id: Uuid) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().sections.for_owner(owner);
        let tasks = self.ctx.caches().tasks.for_owner(owner);

        let result = OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not delete section")
            .pending_delete(id)
            .run(
                move |rows| rows.retain(|s| s.id != id),
                || self.ctx.repo().delete_section(owner, id),
                |_, _: &()| {},
            )
            .await;

        // Tasks lost their section in the store
        tasks.invalidate();
        result
    }

    pub async fn reorder_sections(&self, ordered_ids: &[Uuid]) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().sections.for_owner(owner);
        let positions: HashMap<Uuid, i64> = ordered_ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position as i64))
            .collect();

        let mut update = OptimisticUpdate::new(&cache, self.ctx.notifier()).failure_message("Could not reorder sections");
        for id in ordered_ids {
            update = update.pending_update(*id);
        }

        update
            .run(
                move |rows| {
                    for section in rows.iter_mut() {
                        if let Some(position) = positions.get(&section.id) {
                            section.order = *position;
                        }
                    }
                    rows.sort_by_key(|s| (s.order, s.created_at));
                },
                || self.ctx.repo().reorder_sections(owner, ordered_ids),
                |_, _: &()| {},
            )
            .await
    }

    pub async fn add_category(&self, data: NewCategoryData) -> Result<Category, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().categories.for_owner(owner);
        let temp_id = Uuid::new_v4();
        let draft = Category {
            id: temp_id,
            user_id: owner,
            name: data.name.clone(),
            color: data.color.clone(),
            revision: 0,
            created_at: Utc::now(),
        };

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not add category")
            .run(
                move |rows| rows.push(draft),
                || self.ctx.repo().add_category(owner, data),
                move |cache: &EntityCache<Category>, saved: &Category| cache.replace_id(temp_id, saved.clone()),
            )
            .await
    }

    /// Deletes the category; tasks using it keep existing without one.
    pub async fn delete_category(&self, id: Uuid) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().categories.for_owner(owner);
        let tasks = self.ctx.caches().tasks.for_owner(owner);

        let result = OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not delete category")
            .pending_delete(id)
            .run(
                move |rows| rows.retain(|c| c.id != id),
                || self.ctx.repo().delete_category(owner, id),
                |_, _: &()| {},
            )
            .await;

        tasks.invalidate();
        result
    }
}
