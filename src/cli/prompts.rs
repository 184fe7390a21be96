use anyhow::Result;
use dialoguer::Select;
use is_terminal::IsTerminal;

/// Arrow-key Yes/No selection. Non-interactive runs get the default.
pub fn prompt_confirmation(prompt: &str, default_yes: bool) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(default_yes);
    }

    let items = vec!["Yes", "No"];
    let default_index = if default_yes { 0 } else { 1 };

    let selection = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(default_index)
        .interact()?;

    Ok(selection == 0)
}

pub fn prompt_write_confirmation(records: usize, target: &str) -> Result<bool> {
    prompt_confirmation(
        &format!("Create {} records in {}?", records, target),
        false,
    )
}

/// Asks for the database password when the config leaves it out.
pub fn prompt_db_password(user: &str, server: &str) -> Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let password = rpassword::prompt_password(format!("Database password for {}@{}: ", user, server))?;
    Ok(Some(password))
}
