use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::{duplicate, info, open_session_from, query, sysconf};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Log to file (truncated on each run); RUST_LOG picks the level
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("applus-cli.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    log::info!("Starting applus-cli");

    let needs_db = matches!(
        cli.command,
        Commands::Query { .. } | Commands::Export(_) | Commands::Duplicate(_) | Commands::Replay(_)
    );
    let session = open_session_from(&cli.global, needs_db)?;

    let result = match cli.command {
        Commands::Sysconf(command) => sysconf::handle_sysconf_command(&session, command).await,
        Commands::NextNumber { object_type } => query::next_number_command(&session, &object_type).await,
        Commands::CompleteSql { sql } => query::complete_sql_command(&session, &sql).await,
        Commands::Query { sql, raw } => query::query_command(&session, &sql, raw).await,
        Commands::Export(args) => query::export_command(&session, args).await,
        Commands::Duplicate(args) => duplicate::duplicate_command(&session, args).await,
        Commands::Replay(args) => duplicate::replay_command(&session, args).await,
        Commands::Info => info::info_command(&session).await,
    };

    if let Err(e) = session.close().await {
        log::warn!("Failed to close session: {}", e);
    }
    result
}
