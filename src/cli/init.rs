//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::migrations;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let pool = settings.pool();
    migrations::run(&pool).await?;

    println!(
        "{} Initialized cranewatch in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database: {}", settings.effective_database_url());

    Ok(())
}
