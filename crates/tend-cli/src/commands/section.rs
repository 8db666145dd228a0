use anyhow::Result;
use tend_core::models::NewSectionData;
use tend_core::repository::Repository;
use tend_core::service::{SectionService, ServiceContext};

use super::confirmed;
use crate::cli::{SectionAction, SectionCommand};
use crate::util::{resolve_named, Reported};
use crate::views::table::display_sections;

pub async fn section_command<R: Repository>(ctx: &ServiceContext<R>, command: SectionCommand) -> Result<()> {
    let service = SectionService::new(ctx.clone());

    match command.action {
        SectionAction::Add { name, no_focus } => {
            let section = service
                .add_section(NewSectionData {
                    name,
                    include_in_focus_mode: Some(!no_focus),
                    ..Default::default()
                })
                .await
                .map_err(Reported)?;
            ctx.notifier().success(&format!("Section added: {}", section.name));
        }
        SectionAction::List => {
            display_sections(&service.sections().await);
        }
        SectionAction::Rename { name, new_name } => {
            let sections = service.sections().await;
            let section = resolve_named(&sections, &name, "section")?;
            let renamed = service
                .rename_section(section.id, new_name)
                .await
                .map_err(Reported)?;
            ctx.notifier().success(&format!("Section renamed to {}", renamed.name));
        }
        SectionAction::Focus { name, include } => {
            let sections = service.sections().await;
            let section = resolve_named(&sections, &name, "section")?;
            service
                .set_focus_mode(section.id, include)
                .await
                .map_err(Reported)?;
            let message = if include {
                format!("{} counts towards focus mode", section.name)
            } else {
                format!("{} left out of focus mode", section.name)
            };
            ctx.notifier().success(&message);
        }
        SectionAction::Delete { name, force } => {
            let sections = service.sections().await;
            let section = resolve_named(&sections, &name, "section")?;
            if !confirmed(
                format!("Delete section '{}'? Its tasks are kept.", section.name),
                force,
            ) {
                return Ok(());
            }
            service.delete_section(section.id).await.map_err(Reported)?;
            ctx.notifier().success(&format!("Section deleted: {}", section.name));
        }
        SectionAction::Reorder { names } => {
            let sections = service.sections().await;
            let ordered = names
                .iter()
                .map(|name| resolve_named(&sections, name, "section").map(|s| s.id))
                .collect::<Result<Vec<_>>>()?;
            service.reorder_sections(&ordered).await.map_err(Reported)?;
            ctx.notifier().success("Sections reordered");
        }
    }

    Ok(())
}
