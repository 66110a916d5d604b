use crate::types::ResourcePermission;
use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Tabled)]
pub struct PermissionRow {
    #[tabled(rename = "BINDING")]
    pub binding: String,
    #[tabled(rename = "SCOPE")]
    pub scope: String,
    #[tabled(rename = "ACTIONS")]
    pub actions: String,
    #[tabled(rename = "LABEL")]
    pub label: String,
    #[tabled(rename = "UPDATED")]
    pub updated: String,
}

impl From<&ResourcePermission> for PermissionRow {
    fn from(permission: &ResourcePermission) -> Self {
        Self {
            binding: permission.binding.to_string(),
            scope: permission.scope(),
            actions: permission.actions.join(", "),
            label: permission.permission.clone().unwrap_or_default(),
            updated: permission.updated.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_permissions(permissions: &[ResourcePermission], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(permissions),
        OutputFormat::Text => {
            if permissions.is_empty() {
                println!("{}", "No permissions found".dimmed());
                return Ok(());
            }
            let rows: Vec<PermissionRow> = permissions.iter().map(PermissionRow::from).collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);
            println!("{} row(s)", permissions.len());
            Ok(())
        }
    }
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}
