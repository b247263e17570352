use clap::{Args, Subcommand};

use crate::context::AppContext;
use crate::domain::activity::{ActivityKind, SystemEvent, SystemLogDetails};
use crate::domain::actor::Actor;
use crate::domain::call::FailReason;
use crate::domain::ticket::Ticket;
use crate::error::{AppError, AppResult};
use crate::workflow::{TicketLifecycle, TransitionOutcome};

#[derive(Args, Debug, Clone)]
pub struct TicketArgs {
    /// Ticket document id.
    pub ticket: String,
    #[command(subcommand)]
    pub command: TicketCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TicketCommand {
    /// Show the ticket's current state.
    Show,
    /// Take ownership of the ticket.
    Claim,
    /// Move the ticket to another status; closing statuses also move it to the closed group.
    Status {
        /// Target status id (see `ticketdesk statuses`).
        status: Option<String>,
    },
    /// Hand the ticket to another workgroup, releasing its assignee.
    Transfer {
        /// Target workgroup id (see `ticketdesk groups`).
        group: Option<String>,
    },
    /// Post a log line or comment as the ticket's assignee.
    Comment {
        body: String,
        /// Entry kind: log or comment.
        #[arg(short, long, default_value = "comment")]
        kind: String,
        /// Quote an existing activity entry above the message.
        #[arg(short, long)]
        quote: Option<String>,
    },
    /// Append a system audit line (file attached, notification sent, ...).
    Log {
        event: String,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        old: Option<String>,
        #[arg(long)]
        new: Option<String>,
    },
    /// Record the outcome of a call to the customer.
    Call {
        phone: String,
        /// The customer answered.
        #[arg(long)]
        reached: bool,
        /// Why the call failed: no_answer, busy, unreachable, wrong_number, rejected, voicemail.
        #[arg(long)]
        reason: Option<String>,
    },
    /// List recorded call results, newest first.
    Calls,
}

pub async fn run(ctx: &AppContext, actor: &Actor, args: TicketArgs) -> AppResult<()> {
    let lifecycle = TicketLifecycle::from_context(ctx);
    let ticket_id = args.ticket.as_str();

    match args.command {
        TicketCommand::Show => {
            let ticket = ctx.store.fetch_ticket(ticket_id).await?;
            print_ticket(&ticket);
        }
        TicketCommand::Claim => {
            let outcome = lifecycle.claim(ticket_id, actor).await?;
            if outcome.entry.is_none() {
                println!("Ticket {} is already yours.", outcome.ticket.number);
            } else {
                print_outcome(&outcome);
            }
        }
        TicketCommand::Status { status } => {
            let outcome = lifecycle
                .update_status(ticket_id, actor, status.as_deref())
                .await?;
            print_outcome(&outcome);
        }
        TicketCommand::Transfer { group } => {
            let outcome = lifecycle
                .transfer_group(ticket_id, actor, group.as_deref())
                .await?;
            print_outcome(&outcome);
        }
        TicketCommand::Comment { body, kind, quote } => {
            let kind = ActivityKind::parse(&kind)
                .ok_or_else(|| AppError::Validation(format!("unknown entry kind '{kind}'")))?;
            let quoted = match quote {
                Some(entry_id) => Some(ctx.store.fetch_activity(ticket_id, &entry_id).await?.body),
                None => None,
            };
            let entry = lifecycle
                .append_activity(ticket_id, actor, &body, kind, quoted.as_deref())
                .await?;
            println!("Posted {} {}.", entry.kind.as_str(), entry.id);
        }
        TicketCommand::Log {
            event,
            details,
            user,
            old,
            new,
        } => {
            let extra = SystemLogDetails {
                details,
                related_actor: user,
                old_value: old,
                new_value: new,
            };
            let entry = lifecycle
                .append_system_log(ticket_id, &SystemEvent::parse(&event), extra)
                .await?;
            println!("{}", entry.body);
        }
        TicketCommand::Call {
            phone,
            reached,
            reason,
        } => {
            let record = lifecycle
                .record_call_result(ticket_id, actor, &phone, reached, reason.as_deref())
                .await?;
            println!("Recorded call to {} ({}).", record.phone_number, call_outcome(record.fail_reason));
        }
        TicketCommand::Calls => {
            let records = ctx.store.list_call_results(ticket_id).await?;
            if records.is_empty() {
                println!("No calls recorded.");
            }
            for record in records {
                println!(
                    "{}  {:<16} {:<34} by {}",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.phone_number,
                    call_outcome(record.fail_reason),
                    record.actor_name
                );
            }
        }
    }

    Ok(())
}

fn call_outcome(fail_reason: Option<FailReason>) -> &'static str {
    fail_reason.map_or("reached", |reason| reason.label())
}

fn print_outcome(outcome: &TransitionOutcome) {
    if let Some(entry) = &outcome.entry {
        println!("{}", entry.body);
    }
    print_ticket(&outcome.ticket);
}

fn print_ticket(ticket: &Ticket) {
    println!("Ticket {} ({})", ticket.number, ticket.id);
    println!("  Title:    {}", ticket.title);
    println!("  Customer: {}", ticket.customer.name);
    if let Some(phone) = &ticket.customer.phone {
        println!("  Phone:    {phone}");
    }
    println!("  Priority: {}", ticket.priority.as_str());
    println!(
        "  Status:   {} [{}]{}",
        ticket.display_status(),
        ticket.status.as_str(),
        if ticket.is_closed() { " (closed)" } else { "" }
    );
    println!("  Group:    {}", ticket.group.name);
    println!(
        "  Assignee: {}",
        ticket
            .assignee
            .as_ref()
            .map_or("<unassigned>", |assignee| assignee.name.as_str())
    );
}
