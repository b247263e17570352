use clap::Args;

use crate::context::AppContext;
use crate::domain::activity::{ActivityEntry, ActivityFilter, FeedCursor};
use crate::domain::quote::{BodyBlock, render_body};
use crate::error::{AppError, AppResult};
use crate::workflow::feed::filter_snapshot;
use crate::workflow::{ActivityFeed, FeedPage};

#[derive(Args, Debug, Clone)]
pub struct FeedArgs {
    pub ticket: String,
    /// all, non-system or system.
    #[arg(short, long, default_value = "all")]
    pub filter: String,
    /// Page number; earlier pages are walked to reach it.
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,
    /// Resume after the entry identified by this cursor token.
    #[arg(long, conflicts_with = "page")]
    pub after: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    pub ticket: String,
    #[arg(short, long, default_value = "all")]
    pub filter: String,
}

fn parse_filter(raw: &str) -> AppResult<ActivityFilter> {
    ActivityFilter::parse(raw).ok_or_else(|| {
        AppError::Validation(format!(
            "unknown filter '{raw}' (expected all, non-system or system)"
        ))
    })
}

pub async fn run(ctx: &AppContext, args: FeedArgs) -> AppResult<()> {
    let mut feed = ActivityFeed::new(ctx.store.clone(), args.ticket.clone());
    feed.set_filter(parse_filter(&args.filter)?);

    let page = match args.after {
        Some(token) => feed.page_after(FeedCursor::decode(&token)?).await?,
        None => {
            let mut page = feed.first_page().await?;
            while page.number < args.page {
                if !page.has_more {
                    return Err(AppError::Validation(format!(
                        "ticket has only {} page(s)",
                        page.number
                    )));
                }
                page = feed.next_page().await?;
            }
            page
        }
    };

    print_page(&page);
    Ok(())
}

pub async fn watch(ctx: &AppContext, args: WatchArgs) -> AppResult<()> {
    let filter = parse_filter(&args.filter)?;
    let mut subscription = ctx.store.subscribe_activity(&args.ticket).await?;
    print_snapshot(&filter_snapshot(&subscription.current(), filter));

    loop {
        tokio::select! {
            snapshot = subscription.next_snapshot() => match snapshot {
                Some(entries) => {
                    println!("{}", "-".repeat(60));
                    print_snapshot(&filter_snapshot(&entries, filter));
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.close();
    Ok(())
}

fn print_page(page: &FeedPage) {
    if page.number > 0 {
        println!("Page {} ({} log entries on ticket)", page.number, page.log_total);
    } else {
        println!("{} log entries on ticket", page.log_total);
    }
    if page.entries.is_empty() {
        println!("No activity.");
    }
    for entry in &page.entries {
        print_entry(entry);
    }
    if let Some(cursor) = page.next_cursor() {
        println!("More entries: --after {}", cursor.encode());
    }
}

fn print_snapshot(entries: &[ActivityEntry]) {
    if entries.is_empty() {
        println!("No activity.");
    }
    for entry in entries {
        print_entry(entry);
    }
}

fn print_entry(entry: &ActivityEntry) {
    println!(
        "[{}] {} ({}) {}",
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.author_name,
        entry.kind.as_str(),
        entry.id
    );
    for block in render_body(&entry.body) {
        match block {
            BodyBlock::Text(lines) => {
                for line in lines {
                    println!("    {line}");
                }
            }
            BodyBlock::Quote(lines) => {
                for line in lines {
                    println!("    | {line}");
                }
            }
        }
    }
}
