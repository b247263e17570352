use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use ticketdesk::cmd::config::{self as config_cmd, ConfigArgs};
use ticketdesk::cmd::feed::{self, FeedArgs, WatchArgs};
use ticketdesk::cmd::reference;
use ticketdesk::cmd::ticket::{self, TicketArgs};
use ticketdesk::config::{AppConfig, StoreBackend};
use ticketdesk::context::AppContext;
use ticketdesk::error::AppResult;
use ticketdesk::infra::firestore::FirestoreStore;
use ticketdesk::infra::local::LocalStore;
use ticketdesk::infra::session::StaticIdentity;
use ticketdesk::services::TicketStore;

#[derive(Parser)]
#[command(name = "ticketdesk", author, version, about = "Call-center ticket desk")]
struct Cli {
    #[command(flatten)]
    identity: IdentityArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IdentityArgs {
    /// Act as this user id instead of the configured one.
    #[arg(long, global = true)]
    actor_id: Option<String>,
    /// Display name to record for the acting user.
    #[arg(long, global = true)]
    actor_name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Work on a single ticket.
    Ticket(TicketArgs),
    /// Page through a ticket's activity, newest first.
    Feed(FeedArgs),
    /// Follow a ticket's activity live until interrupted.
    Watch(WatchArgs),
    /// List the configured ticket statuses.
    Statuses,
    /// List the configured workgroups.
    Groups,
    /// Create the reserved closed-tickets workgroup if it is missing.
    EnsureClosedGroup,
    /// Manage CLI configuration.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    if let Commands::Config(args) = cli.command {
        return config_cmd::run(args.command);
    }

    let context = build_context(cli.identity)?;
    match cli.command {
        Commands::Ticket(args) => {
            let actor = context.identity.current_actor().await?;
            ticket::run(&context, &actor, args).await
        }
        Commands::Feed(args) => feed::run(&context, args).await,
        Commands::Watch(args) => feed::watch(&context, args).await,
        Commands::Statuses => reference::list_statuses(&context).await,
        Commands::Groups => reference::list_groups(&context).await,
        Commands::EnsureClosedGroup => reference::ensure_closed_group(&context).await,
        Commands::Config(_) => Ok(()),
    }
}

fn build_context(identity: IdentityArgs) -> AppResult<AppContext> {
    let config = AppConfig::load()?;

    let store: Arc<dyn TicketStore> = match config.backend {
        StoreBackend::Local => Arc::new(LocalStore::open(&config.local_path)?),
        StoreBackend::Firestore => {
            if config.firestore_project.is_none() {
                eprintln!("Warning: Firestore project not configured; store calls will fail.");
            }
            if config.firestore_token.is_none() {
                eprintln!("Warning: Firestore access token not configured; store calls will fail.");
            }
            let mut store = FirestoreStore::new(
                config.firestore_project.clone(),
                config.firestore_database.clone(),
                config.firestore_token.clone(),
                config.poll_interval,
            );
            if let Some(endpoint) = &config.firestore_endpoint {
                store = store.with_endpoint(endpoint.clone());
            }
            Arc::new(store)
        }
    };

    let identity = Arc::new(StaticIdentity::new(
        identity.actor_id.or_else(|| config.actor_id.clone()),
        identity.actor_name.or_else(|| config.actor_name.clone()),
    ));

    Ok(AppContext::new(config, store, identity))
}
