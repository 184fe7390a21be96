use anyhow::{Context, Result};
use applus::Session;
use clap::Subcommand;
use colored::*;

#[derive(Subcommand)]
pub enum SysconfCommands {
    /// Read a string value
    Get { module: String, name: String },
    /// Read a value and split it into a list
    List {
        module: String,
        name: String,
        /// Separator between list entries
        #[arg(long, default_value = ",")]
        sep: String,
    },
    /// Read an integer value
    Int { module: String, name: String },
    /// Read a floating point value
    Double { module: String, name: String },
    /// Read a boolean value
    Bool { module: String, name: String },
}

fn print_value(module: &str, name: &str, value: Option<String>) {
    let key = format!("{}/{}", module, name);
    match value {
        Some(value) => println!("{} = {}", key.cyan(), value),
        None => println!("{} {}", key.cyan(), "(not set)".dimmed()),
    }
}

pub async fn handle_sysconf_command(session: &Session, command: SysconfCommands) -> Result<()> {
    let sysconf = session.sysconf();
    let context = |m: &str, n: &str| format!("Failed to read system configuration {}/{}", m, n);

    match command {
        SysconfCommands::Get { module, name } => {
            let value = sysconf.get_string(&module, &name).await.with_context(|| context(&module, &name))?;
            print_value(&module, &name, value);
        }
        SysconfCommands::List { module, name, sep } => {
            let values = sysconf
                .get_list(&module, &name, &sep)
                .await
                .with_context(|| context(&module, &name))?;
            match values {
                Some(values) => {
                    println!("{}:", format!("{}/{}", module, name).cyan());
                    for value in values {
                        println!("  - {}", value);
                    }
                }
                None => print_value(&module, &name, None),
            }
        }
        SysconfCommands::Int { module, name } => {
            let value = sysconf.get_int(&module, &name).await.with_context(|| context(&module, &name))?;
            print_value(&module, &name, value.map(|v| v.to_string()));
        }
        SysconfCommands::Double { module, name } => {
            let value = sysconf.get_double(&module, &name).await.with_context(|| context(&module, &name))?;
            print_value(&module, &name, value.map(|v| v.to_string()));
        }
        SysconfCommands::Bool { module, name } => {
            let value = sysconf.get_boolean(&module, &name).await.with_context(|| context(&module, &name))?;
            print_value(&module, &name, value.map(|v| v.to_string()));
        }
    }
    Ok(())
}
