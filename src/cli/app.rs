use super::commands::duplicate::{DuplicateArgs, ReplayArgs};
use super::commands::query::ExportArgs;
use super::commands::sysconf::SysconfCommands;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "applus-cli")]
#[command(about = "Command line access to an APplus ERP application server")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Config file (defaults to $APPLUS_CONFIG or the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the app server user
    #[arg(long, global = true)]
    pub user: Option<String>,
    /// Override the app server environment
    #[arg(long, global = true)]
    pub env: Option<String>,
    /// Apply a named entry of the config's `environments`
    #[arg(long, global = true)]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read system configuration values
    #[command(subcommand)]
    Sysconf(SysconfCommands),
    /// Allocate the next number of a number range
    NextNumber {
        /// Number range, e.g. 'Artikel'
        object_type: String,
    },
    /// Show the server's completed form of a SQL statement
    CompleteSql {
        sql: String,
    },
    /// Run a SQL query and print the result
    Query {
        sql: String,
        /// Send the SQL to the database without completing it first
        #[arg(long)]
        raw: bool,
    },
    /// Run a SQL query and write the result to an Excel file
    Export(ExportArgs),
    /// Copy a business object with its dependent records
    Duplicate(DuplicateArgs),
    /// Write a saved duplication snapshot into a system
    Replay(ReplayArgs),
    /// Show the effective connection settings
    Info,
}
