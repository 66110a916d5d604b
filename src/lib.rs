//! Resource permission store and resolver for role-based access control.
//!
//! Permissions are rows granting a set of actions on one resource tuple
//! (`resource`, `resource_attribute`, `resource_id`) to a binding: a user,
//! a team, or a built-in role. [`storage::AccessControlStore`] persists them
//! and resolves every row that applies to a [`types::SignedInUser`].

pub mod binding;
pub mod cache;
pub mod commands;
pub mod context;
pub mod entities;
pub mod error;
pub mod hook;
pub mod logging;
pub mod migration;
pub mod resolution;
pub mod roles;
pub mod storage;
pub mod types;

pub use binding::{Binding, BindingKind};
pub use cache::{CacheInvalidationHook, PermissionCache};
pub use context::RequestContext;
pub use error::{AccessControlError, ErrorKind, Result};
pub use hook::ResourceHook;
pub use roles::BuiltInRole;
pub use storage::{AccessControlStore, StoreConfig, StoreManager};
pub use types::{
    GetResourcePermissionsQuery, GetUserPermissionsQuery, ResourcePermission,
    SetResourcePermissionCommand, SetResourcePermissionsCommand, SignedInUser,
};

use clap::Parser;
use tracing::level_filters::LevelFilter;

/// Entry point of the `accesscontrol` binary.
pub async fn run() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    // Configuration first; logging settings live in it.
    let config_manager = commands::load_config_manager(&cli)?;
    let config = config_manager.config().clone();

    let level = cli.verbose.then_some(LevelFilter::DEBUG);
    let _guard = logging::init_tracing(&config.logging_settings(), level);
    tracing::debug!("Store config: {:?}", config_manager.config_path());

    let manager = StoreManager::new(config).await?;
    commands::execute(cli, manager).await
}
