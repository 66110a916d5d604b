use super::output::{print_json, success, warning, OutputFormat};
use crate::storage::StoreManager;
use colored::Colorize;
use serde_json::json;
use std::collections::BTreeMap;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "TABLE")]
    name: String,
    #[tabled(rename = "ROWS")]
    count: i64,
}

/// Migrations already ran when the store was opened; report where.
pub fn migrate(manager: &StoreManager, format: OutputFormat) -> anyhow::Result<()> {
    let path = manager.config().get_sqlite_path()?;
    match format {
        OutputFormat::Json => print_json(&json!({ "migrated": true, "database": path })),
        OutputFormat::Text => {
            success(&format!("Schema is up to date: {}", path.display()));
            Ok(())
        }
    }
}

pub async fn health(manager: &StoreManager, format: OutputFormat) -> anyhow::Result<()> {
    let health = manager.health_check().await;
    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Text if health.healthy => success(&health.message),
        OutputFormat::Text => warning(&health.message),
    }

    if !health.healthy {
        anyhow::bail!("Permission store is unhealthy");
    }
    Ok(())
}

pub async fn stats(manager: &StoreManager, org_id: Option<i64>, format: OutputFormat) -> anyhow::Result<()> {
    let tables: BTreeMap<String, i64> = manager.stats().await?.into_iter().collect();
    let permissions: BTreeMap<String, i64> = manager
        .store()
        .stats(org_id)
        .await?
        .into_iter()
        .collect();

    match format {
        OutputFormat::Json => print_json(&json!({
            "tables": tables,
            "permissions": permissions,
            "org_id": org_id,
        })),
        OutputFormat::Text => {
            println!("{}", "Tables".bold());
            let mut table = Table::new(tables.into_iter().map(|(name, count)| CountRow { name, count }));
            table.with(Style::rounded());
            println!("{}", table);

            match org_id {
                Some(org_id) => println!("{}", format!("Permissions by binding (org {})", org_id).bold()),
                None => println!("{}", "Permissions by binding".bold()),
            }
            let mut table =
                Table::new(permissions.into_iter().map(|(name, count)| CountRow { name, count }));
            table.with(Style::rounded());
            println!("{}", table);
            Ok(())
        }
    }
}
