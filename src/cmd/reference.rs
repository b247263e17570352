use crate::context::AppContext;
use crate::error::AppResult;
use crate::workflow::TicketLifecycle;

pub async fn list_statuses(ctx: &AppContext) -> AppResult<()> {
    let statuses = ctx.store.list_statuses().await?;
    if statuses.is_empty() {
        println!("No statuses configured.");
    }
    for status in statuses {
        let marker = if status.is_closing() { " (closes ticket)" } else { "" };
        println!("{:<20} {}{marker}", status.id, status.name);
    }
    Ok(())
}

pub async fn list_groups(ctx: &AppContext) -> AppResult<()> {
    let groups = ctx.store.list_workgroups().await?;
    if groups.is_empty() {
        println!("No workgroups configured.");
    }
    for group in groups {
        println!("{:<28} {}", group.id, group.name);
    }
    Ok(())
}

pub async fn ensure_closed_group(ctx: &AppContext) -> AppResult<()> {
    let lifecycle = TicketLifecycle::from_context(ctx);
    let created = lifecycle.ensure_closed_group_exists().await?;
    let group = lifecycle.closed_group();
    if created {
        println!("Created workgroup '{}' ({}).", group.name, group.id);
    } else {
        println!("Workgroup '{}' ({}) already exists.", group.name, group.id);
    }
    Ok(())
}
