use anyhow::Result;
use applus::Session;
use colored::*;

fn row(label: &str, value: &str) {
    println!("  {:<12} {}", format!("{}:", label).dimmed(), value);
}

pub async fn info_command(session: &Session) -> Result<()> {
    let config = session.config();

    println!("{}", "APplus connection".bold());
    row("endpoint", &session.gateway().endpoint());
    row("user", session.user());
    row("environment", session.environment());
    match session.tenant().await {
        Ok(tenant) => row("tenant", &tenant.bright_green().to_string()),
        Err(e) => row("tenant", &format!("{}", e).red().to_string()),
    }
    row("database", &config.dbserver.describe());
    row("web", config.web_base_url().unwrap_or("-"));
    Ok(())
}
