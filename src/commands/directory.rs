//! Directory seeding commands: organizations, users, teams

use super::output::{print_json, success, OutputFormat};
use crate::storage::StoreManager;
use serde_json::json;

pub async fn add_org(manager: &StoreManager, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let org = manager.directory().create_org(name).await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "id": org.id, "name": org.name })),
        OutputFormat::Text => {
            success(&format!("Created organization '{}' (id {})", org.name, org.id));
            Ok(())
        }
    }
}

pub async fn add_user(
    manager: &StoreManager,
    org_id: i64,
    login: &str,
    role: &str,
    server_admin: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let directory = manager.directory();
    let user = directory.create_user(org_id, login, role).await?;
    if server_admin {
        directory.set_server_admin(user.id, true).await?;
    }

    match format {
        OutputFormat::Json => print_json(&json!({
            "id": user.id,
            "login": user.login,
            "org_id": org_id,
            "role": role,
            "is_server_admin": server_admin,
        })),
        OutputFormat::Text => {
            let role = if role.is_empty() { "no role" } else { role };
            success(&format!(
                "Created user '{}' (id {}) in org {} with {}{}",
                user.login,
                user.id,
                org_id,
                role,
                if server_admin { ", server admin" } else { "" }
            ));
            Ok(())
        }
    }
}

pub async fn add_team(
    manager: &StoreManager,
    org_id: i64,
    name: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let team = manager.directory().create_team(org_id, name).await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "id": team.id, "org_id": org_id, "name": team.name })),
        OutputFormat::Text => {
            success(&format!("Created team '{}' (id {}) in org {}", team.name, team.id, org_id));
            Ok(())
        }
    }
}

pub async fn add_team_member(
    manager: &StoreManager,
    org_id: i64,
    team_id: i64,
    user_id: i64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    manager
        .directory()
        .add_team_member(org_id, team_id, user_id)
        .await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "org_id": org_id, "team_id": team_id, "user_id": user_id })),
        OutputFormat::Text => {
            success(&format!("Added user {} to team {}", user_id, team_id));
            Ok(())
        }
    }
}
