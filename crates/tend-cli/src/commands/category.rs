use anyhow::Result;
use tend_core::models::NewCategoryData;
use tend_core::repository::Repository;
use tend_core::service::{SectionService, ServiceContext};

use super::confirmed;
use crate::cli::{CategoryAction, CategoryCommand};
use crate::util::{resolve_named, Reported};
use crate::views::table::display_categories;

pub async fn category_command<R: Repository>(ctx: &ServiceContext<R>, command: CategoryCommand) -> Result<()> {
    let service = SectionService::new(ctx.clone());

    match command.action {
        CategoryAction::Add { name, color } => {
            let category = service
                .add_category(NewCategoryData { name, color })
                .await
                .map_err(Reported)?;
            ctx.notifier().success(&format!("Category added: {}", category.name));
        }
        CategoryAction::List => display_categories(&service.categories().await),
        CategoryAction::Delete { name, force } => {
            let categories = service.categories().await;
            let category = resolve_named(&categories, &name, "category")?;
            if !confirmed(
                format!("Delete category '{}'? Its tasks become uncategorized.", category.name),
                force,
            ) {
                return Ok(());
            }
            service.delete_category(category.id).await.map_err(Reported)?;
            ctx.notifier().success(&format!("Category deleted: {}", category.name));
        }
    }

    Ok(())
}
