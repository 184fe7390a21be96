use super::open_target_session;
use crate::cli::prompts::prompt_write_confirmation;
use anyhow::{Context, Result, bail};
use applus::duplicate::{DuplicationPlan, Duplicator, RecordSnapshot};
use applus::{DbTableIds, Error, Session};
use clap::Args;
use colored::*;
use std::path::PathBuf;

#[derive(Args)]
pub struct DuplicateArgs {
    /// Business object type, e.g. Artikel
    pub object_type: String,
    /// Key (or ID) of the record to copy
    pub id: String,
    /// Key of the copy; allocated from the number range when omitted
    #[arg(long)]
    pub new_id: Option<String>,
    /// Field override for the copy, as FIELD=VALUE
    #[arg(long = "set", value_parser = parse_assignment)]
    pub overrides: Vec<(String, String)>,
    /// Relation to leave out, e.g. aplan
    #[arg(long = "exclude")]
    pub excluded: Vec<String>,
    /// Do not copy dynamic attribute values
    #[arg(long)]
    pub no_attributes: bool,
    /// Save the snapshot to this file instead of writing it anywhere
    #[arg(long, conflicts_with = "target_config")]
    pub snapshot: Option<PathBuf>,
    /// Config of the system to write the copy into (defaults to the source)
    #[arg(long)]
    pub target_config: Option<PathBuf>,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Snapshot file written by `duplicate --snapshot`
    pub file: PathBuf,
    /// Config of the system to write into (defaults to the current one)
    #[arg(long)]
    pub target_config: Option<PathBuf>,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

fn parse_assignment(arg: &str) -> std::result::Result<(String, String), String> {
    arg.split_once('=')
        .map(|(f, v)| (f.trim().to_string(), v.to_string()))
        .filter(|(f, _)| !f.is_empty())
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", arg))
}

fn build_plan(duplicator: &Duplicator<'_>, args: &DuplicateArgs) -> Result<DuplicationPlan> {
    let mut plan = DuplicationPlan::new();
    for (field, value) in &args.overrides {
        plan = plan.set(field, value.as_str());
    }
    if let Some(new_id) = &args.new_id {
        let descriptor = duplicator
            .registry()
            .get(&args.object_type)
            .with_context(|| format!("Unknown business object type: {}", args.object_type))?;
        let Some(key) = &descriptor.key_field else {
            bail!("{} has no business key; use --set to change fields", descriptor.object_type);
        };
        plan = plan.set(key, new_id.as_str());
    }
    for relation in &args.excluded {
        plan = plan.exclude_relation(relation);
    }
    if args.no_attributes {
        plan = plan.without_attributes();
    }
    Ok(plan)
}

fn print_created(created: &DbTableIds) {
    println!("✅ Created {} records", created.len().to_string().bright_green());
    for (table, ids) in created.tables() {
        let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
        println!("  {:<20} {}", table.cyan(), ids.join(", "));
    }
}

fn report_failure(err: Error) -> anyhow::Error {
    if let Error::Duplication { created, .. } = &err {
        if !created.is_empty() {
            eprintln!("{}", "Records created before the failure (not rolled back):".yellow());
            for (table, ids) in created.tables() {
                let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
                eprintln!("  {:<20} {}", table, ids.join(", "));
            }
        }
    }
    anyhow::Error::new(err).context("Duplication failed")
}

async fn write_snapshot(target: &Session, snapshot: &RecordSnapshot, yes: bool) -> Result<()> {
    let target_name = format!("{} ({})", target.gateway().endpoint(), target.environment());
    if !yes && !prompt_write_confirmation(snapshot.len(), &target_name)? {
        println!("{}", "Aborted.".yellow());
        return Ok(());
    }

    let created = Duplicator::materialize(target, snapshot).await.map_err(report_failure)?;
    print_created(&created);
    Ok(())
}

pub async fn duplicate_command(source: &Session, args: DuplicateArgs) -> Result<()> {
    let mut duplicator = Duplicator::new(source);
    let plan = build_plan(&duplicator, &args)?;

    println!("🔄 {}", format!("Reading {} {}...", args.object_type, args.id).dimmed());
    let snapshot = duplicator
        .snapshot(&args.object_type, &args.id, &plan)
        .await
        .map_err(report_failure)?;
    println!("📦 {} records to copy", snapshot.len());

    if let Some(path) = &args.snapshot {
        snapshot
            .save(path)
            .with_context(|| format!("Failed to save snapshot: {}", path.display()))?;
        println!("💾 Snapshot saved to: {}", path.display().to_string().bright_green());
        return Ok(());
    }

    match &args.target_config {
        Some(path) => {
            let target = open_target_session(path)?;
            write_snapshot(&target, &snapshot, args.yes).await
        }
        None => write_snapshot(source, &snapshot, args.yes).await,
    }
}

pub async fn replay_command(current: &Session, args: ReplayArgs) -> Result<()> {
    let snapshot = RecordSnapshot::load(&args.file)
        .with_context(|| format!("Failed to load snapshot: {}", args.file.display()))?;
    println!("📄 Loaded {} records from {}", snapshot.len(), args.file.display());

    match &args.target_config {
        Some(path) => {
            let target = open_target_session(path)?;
            write_snapshot(&target, &snapshot, args.yes).await
        }
        None => write_snapshot(current, &snapshot, args.yes).await,
    }
}
