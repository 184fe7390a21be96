use anyhow::{Context, Result};
use applus::QueryResult;
use applus::Session;
use applus::report::{ExportOptions, export_query};
use clap::Args;
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Args)]
pub struct ExportArgs {
    /// SQL query; completed by the server before it runs
    pub sql: String,
    /// Target .xlsx file
    #[arg(short, long)]
    pub output: PathBuf,
    /// Worksheet name
    #[arg(long)]
    pub sheet: Option<String>,
    /// Format the data as an Excel table
    #[arg(long)]
    pub table: bool,
    /// Number format for a column, as COLUMN=FORMAT (e.g. MENGE=0.000)
    #[arg(long = "format", value_parser = parse_column_format)]
    pub formats: Vec<(String, String)>,
}

fn parse_column_format(arg: &str) -> std::result::Result<(String, String), String> {
    arg.split_once('=')
        .map(|(c, f)| (c.trim().to_string(), f.to_string()))
        .filter(|(c, _)| !c.is_empty())
        .ok_or_else(|| format!("expected COLUMN=FORMAT, got '{}'", arg))
}

pub async fn next_number_command(session: &Session, object_type: &str) -> Result<()> {
    let number = session
        .next_number(object_type)
        .await
        .with_context(|| format!("Failed to allocate a number for {}", object_type))?;
    println!("{}", number);
    Ok(())
}

pub async fn complete_sql_command(session: &Session, sql: &str) -> Result<()> {
    let completed = session.complete_sql(sql).await.context("Failed to complete SQL")?;
    println!("{}", completed);
    Ok(())
}

pub async fn query_command(session: &Session, sql: &str, raw: bool) -> Result<()> {
    let start = Instant::now();
    let result = if raw {
        session.query_raw(sql, &[]).await
    } else {
        session.query(sql, &[]).await
    }
    .context("Failed to execute query")?;

    print_table(&result);
    println!();
    println!(
        "{}",
        format!("{} rows in {:.2}ms", result.len(), start.elapsed().as_secs_f64() * 1000.0).dimmed()
    );
    Ok(())
}

pub async fn export_command(session: &Session, args: ExportArgs) -> Result<()> {
    let mut options = ExportOptions {
        add_table: args.table,
        ..ExportOptions::default()
    };
    for (column, format) in &args.formats {
        options = options.with_column_format(column, format);
    }

    let result = export_query(session, &args.sql, &args.output, args.sheet.as_deref(), &options)
        .await
        .with_context(|| format!("Failed to export query to {}", args.output.display()))?;

    println!(
        "💾 {} rows exported to: {}",
        result.len(),
        args.output.display().to_string().bright_green()
    );
    Ok(())
}

/// Plain column-aligned rendering.
pub fn print_table(result: &QueryResult) {
    let cells: Vec<Vec<String>> = result
        .rows()
        .iter()
        .map(|row| row.iter().map(|v| if v.is_null() { String::new() } else { v.to_string() }).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns().iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header: Vec<String> = result
        .columns()
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<width$}", c, width = *w))
        .collect();
    println!("{}", header.join("  ").bold());
    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        println!("{}", line.join("  "));
    }
}
