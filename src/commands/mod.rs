//! `accesscontrol` command line

pub mod admin;
pub mod directory;
pub mod output;
pub mod permissions;

use crate::binding::Binding;
use crate::storage::{StoreConfigManager, StoreManager};
use clap::{Args, Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "accesscontrol")]
#[command(author, version, about = "Resource permission store and resolver", long_about = None)]
pub struct Cli {
    /// Store config file (defaults to <config_dir>/accesscontrol/store.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or upgrade the database schema
    Migrate,

    /// Check the database is reachable and queryable
    Health,

    /// Show row counts
    Stats {
        /// Restrict permission counts to one organization
        #[arg(long)]
        org: Option<i64>,
    },

    /// Manage organizations
    Org {
        #[command(subcommand)]
        action: OrgAction,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage teams
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Replace the actions a principal holds on a resource
    Grant {
        #[arg(long)]
        org: i64,
        #[command(flatten)]
        binding: BindingArgs,
        #[command(flatten)]
        resource: ResourceArgs,
        /// Action to grant, repeatable
        #[arg(long = "action", required = true)]
        actions: Vec<String>,
        /// Label stored with the row, e.g. "Edit"
        #[arg(long)]
        label: Option<String>,
    },

    /// Remove the row a principal holds on a resource
    Revoke {
        #[arg(long)]
        org: i64,
        #[command(flatten)]
        binding: BindingArgs,
        #[command(flatten)]
        resource: ResourceArgs,
    },

    /// Resolve every permission that applies to a user
    List {
        #[arg(long)]
        org: i64,
        #[arg(long)]
        user: i64,
        /// Keep rows granting any of these actions, repeatable
        #[arg(long = "action")]
        actions: Vec<String>,
    },

    /// List every row on a resource
    Resource {
        #[arg(long)]
        org: i64,
        #[command(flatten)]
        resource: ResourceArgs,
        /// Scope whose rows also apply, e.g. folders:uid:abc; repeatable
        #[arg(long = "inherited")]
        inherited_scopes: Vec<String>,
        #[arg(long = "action")]
        actions: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum OrgAction {
    Add { name: String },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    Add {
        #[arg(long)]
        org: i64,
        login: String,
        /// Organization role: Viewer, Editor or Admin
        #[arg(long, default_value = "")]
        role: String,
        #[arg(long)]
        server_admin: bool,
    },
    /// Delete every permission row bound to a user
    Purge {
        #[arg(long)]
        org: i64,
        #[arg(long)]
        user: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum TeamAction {
    Add {
        #[arg(long)]
        org: i64,
        name: String,
    },
    AddMember {
        #[arg(long)]
        org: i64,
        #[arg(long)]
        team: i64,
        #[arg(long)]
        user: i64,
    },
    /// Delete every permission row bound to a team
    Purge {
        #[arg(long)]
        org: i64,
        #[arg(long)]
        team: i64,
    },
}

/// Exactly one principal
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct BindingArgs {
    #[arg(long)]
    pub user: Option<i64>,
    #[arg(long)]
    pub team: Option<i64>,
    /// Built-in role name, e.g. Viewer or "Server Admin"
    #[arg(long)]
    pub role: Option<String>,
}

impl BindingArgs {
    pub fn binding(&self) -> anyhow::Result<Binding> {
        match (self.user, self.team, &self.role) {
            (Some(user), None, None) => Ok(Binding::user(user)),
            (None, Some(team), None) => Ok(Binding::team(team)),
            (None, None, Some(role)) => Ok(Binding::built_in_role(role.clone())),
            _ => anyhow::bail!("Specify exactly one of --user, --team or --role"),
        }
    }
}

#[derive(Args, Debug)]
pub struct ResourceArgs {
    /// Resource kind, e.g. dashboards
    #[arg(long)]
    pub resource: String,
    /// Attribute identifying the resource, e.g. uid
    #[arg(long, default_value = "uid")]
    pub attribute: String,
    /// Resource identifier
    #[arg(long)]
    pub id: String,
}

/// Open the store described by the CLI flags and run the chosen command.
pub async fn execute(cli: Cli, manager: StoreManager) -> anyhow::Result<()> {
    let format = cli.format;

    match cli.command {
        Commands::Migrate => admin::migrate(&manager, format),
        Commands::Health => admin::health(&manager, format).await,
        Commands::Stats { org } => admin::stats(&manager, org, format).await,

        Commands::Org { action } => match action {
            OrgAction::Add { name } => directory::add_org(&manager, &name, format).await,
        },

        Commands::User { action } => match action {
            UserAction::Add {
                org,
                login,
                role,
                server_admin,
            } => directory::add_user(&manager, org, &login, &role, server_admin, format).await,
            UserAction::Purge { org, user } => {
                permissions::purge(&manager, org, &Binding::user(user), format).await
            }
        },

        Commands::Team { action } => match action {
            TeamAction::Add { org, name } => directory::add_team(&manager, org, &name, format).await,
            TeamAction::AddMember { org, team, user } => {
                directory::add_team_member(&manager, org, team, user, format).await
            }
            TeamAction::Purge { org, team } => {
                permissions::purge(&manager, org, &Binding::team(team), format).await
            }
        },

        Commands::Grant {
            org,
            binding,
            resource,
            actions,
            label,
        } => {
            permissions::grant(&manager, org, &binding.binding()?, &resource, actions, label, format)
                .await
        }

        Commands::Revoke {
            org,
            binding,
            resource,
        } => permissions::revoke(&manager, org, &binding.binding()?, &resource, format).await,

        Commands::List { org, user, actions } => {
            permissions::list(&manager, org, user, actions, format).await
        }

        Commands::Resource {
            org,
            resource,
            inherited_scopes,
            actions,
        } => permissions::resource(&manager, org, &resource, inherited_scopes, actions, format).await,
    }
}

/// Load the store config named by `--config` (or the default one) and apply `--db`.
pub fn load_config_manager(cli: &Cli) -> anyhow::Result<StoreConfigManager> {
    let mut manager = match &cli.config {
        Some(path) => StoreConfigManager::with_path(path.clone())?,
        None => StoreConfigManager::new()?,
    };
    if let Some(db) = &cli.db {
        manager.override_sqlite_path(db.clone());
    }
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grant() {
        let cli = Cli::try_parse_from([
            "accesscontrol",
            "grant",
            "--org",
            "1",
            "--role",
            "Server Admin",
            "--resource",
            "dashboards",
            "--id",
            "abc",
            "--action",
            "dashboards:read",
            "--action",
            "dashboards:write",
        ])
        .unwrap();

        match cli.command {
            Commands::Grant {
                binding,
                resource,
                actions,
                ..
            } => {
                assert_eq!(binding.binding().unwrap(), Binding::built_in_role("Server Admin"));
                assert_eq!(resource.attribute, "uid");
                assert_eq!(actions.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_binding_is_exclusive() {
        let result = Cli::try_parse_from([
            "accesscontrol",
            "revoke",
            "--org",
            "1",
            "--user",
            "1",
            "--team",
            "2",
            "--resource",
            "dashboards",
            "--id",
            "abc",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "accesscontrol",
            "revoke",
            "--org",
            "1",
            "--resource",
            "dashboards",
            "--id",
            "abc",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["accesscontrol", "stats", "--format", "json", "--db", "/tmp/x.db"])
            .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
    }
}
