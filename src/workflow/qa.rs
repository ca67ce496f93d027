//! `qa` command: read-only view of tickets and release branches under QA.

use crate::integrations::tracker::Ticket;

use super::{Services, WorkflowResult};

/// List the release branches on the mainline and the tickets from the
/// user's saved filter. `verbose` adds per-ticket type, status, and
/// assignee detail; the ticket set itself is the same either way.
pub async fn qa(services: &Services, verbose: bool) -> WorkflowResult<()> {
    let release_prefix =
        format!("{}-{}-", services.config.release.prefix, services.config.release.main);
    let branches = services.mainline.list_branches(Some(&release_prefix)).await?;

    println!("Release branches:");
    if branches.is_empty() {
        println!("  (none)");
    }
    for branch in &branches {
        println!("  {}", branch.name);
    }

    let tickets =
        services.tracker.my_tickets(&services.config.tracker.ticket_filter_id).await?;

    println!();
    println!("Tickets:");
    if tickets.is_empty() {
        println!("  (none)");
    }
    for ticket in &tickets {
        println!("  {}", format_ticket(ticket, verbose));
    }

    Ok(())
}

/// Render one ticket line; verbose adds type, status, and assignee.
pub fn format_ticket(ticket: &Ticket, verbose: bool) -> String {
    if verbose {
        let assignee = ticket.assignee.as_deref().unwrap_or("Unassigned");
        format!(
            "{} [{} / {}] {} ({})",
            ticket.key, ticket.type_name, ticket.status, ticket.summary, assignee
        )
    } else {
        format!("{} {}", ticket.key, ticket.summary)
    }
}
