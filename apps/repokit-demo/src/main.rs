mod note;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use repokit::{CancellationToken, ListQuery, Repository};
use repokit_db::{
    persistence, redact_credentials_in_dsn, register_persistence, ClientHub, DbHandle,
    UnitOfWorkFactory,
};
use runtime::{AppConfig, CliArgs};
use sea_orm::{ColumnTrait, ConnectionTrait, Schema};
use std::path::PathBuf;
use std::sync::Arc;

/// repokit demo - seeds a notes table and prints one page of it
#[derive(Parser)]
#[command(name = "repokit-demo")]
#[command(about = "repokit demo - seeds a notes table and prints one page of it")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed sample notes and print a page as JSON
    Run(RunArgs),
    /// Check configuration
    Check,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Number of notes to seed before listing
    #[arg(long, default_value_t = 5)]
    seed: u32,

    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    page: u64,

    /// Page size (defaults to paging.default_page_size, capped at paging.max_page_size)
    #[arg(long)]
    page_size: Option<u64>,

    /// Only list notes whose title contains this text
    #[arg(long)]
    contains: Option<String>,

    /// Order by title descending
    #[arg(long)]
    desc: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::init_logging_from_config(&logging_config, &config.home_dir);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run(RunArgs::default_run())) {
        Commands::Run(run_args) => run(config, run_args).await,
        Commands::Check => check_config(&config),
    }
}

impl RunArgs {
    fn default_run() -> Self {
        Self {
            seed: 5,
            page: 1,
            ..Self::default()
        }
    }
}

async fn run(config: AppConfig, args: RunArgs) -> Result<()> {
    let db_config = config.database_or_default();
    let db = DbHandle::from_config(&db_config)
        .await
        .context("failed to connect to the database")?;
    create_schema(&db).await?;

    let hub = ClientHub::new();
    register_persistence(&hub, Arc::new(db.clone()));

    let cancel = CancellationToken::new();
    seed_notes(&hub, args.seed, &cancel).await?;

    let mut query = ListQuery::<note::Entity>::new();
    query = if args.desc {
        query.order_by_desc(note::Column::Title)
    } else {
        query.order_by(note::Column::Title)
    };
    if let Some(text) = &args.contains {
        query = query.filter(note::Column::Title.contains(text));
    }

    let page_size = config.paging.effective_page_size(args.page_size);
    let page = db
        .repository::<note::Entity>()
        .list_paged(args.page, page_size, query, &cancel)
        .await?;
    tracing::info!(
        returned = page.items.len(),
        total_items = page.total_items,
        total_pages = page.total_pages(),
        "listed notes"
    );

    println!("{}", serde_json::to_string_pretty(&page)?);
    drop(hub);
    db.close().await?;
    Ok(())
}

async fn create_schema(db: &DbHandle) -> Result<()> {
    let backend = db.sea().get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(note::Entity);
    stmt.if_not_exists();
    db.sea()
        .execute(backend.build(&stmt))
        .await
        .context("failed to create notes table")?;
    Ok(())
}

/// Insert `count` notes in one unit of work.
async fn seed_notes(hub: &ClientHub, count: u32, cancel: &CancellationToken) -> Result<()> {
    let uow = persistence(hub)?.begin().await?;
    let notes = uow.repository::<note::Entity>();
    for i in 1..=count {
        let draft = note::draft(
            format!("Note {i:03}"),
            format!("Body of note {i}"),
            i % 3 == 0,
        );
        notes.create(Some(draft), cancel).await?;
    }
    uow.commit().await?;
    tracing::info!(count, "seeded notes");
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let dsn = config.database_or_default().to_dsn()?;
    println!("Configuration check passed");
    println!("database: {}", redact_credentials_in_dsn(Some(&dsn)));
    println!(
        "paging: default={} max={}",
        config.paging.default_page_size, config.paging.max_page_size
    );
    Ok(())
}
