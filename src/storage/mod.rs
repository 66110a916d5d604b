// SQLite-backed permission storage

pub mod access_control_store;
pub mod config;
pub mod directory;
pub mod manager;

pub use access_control_store::AccessControlStore;
pub use config::{StoreConfig, StoreConfigManager};
pub use directory::{PrincipalDirectory, SqlDirectory};
pub use manager::{StoreHealth, StoreManager};

#[cfg(test)]
pub(crate) mod test_support {
    use super::{StoreConfig, StoreManager};
    use sea_orm::DatabaseConnection;
    use tempfile::TempDir;

    /// Fresh migrated database in a temp dir; keep the `TempDir` alive for the test.
    pub(crate) async fn test_database() -> (TempDir, DatabaseConnection) {
        let dir = tempfile::tempdir().unwrap();
        let manager = StoreManager::new(StoreConfig::with_db_path(dir.path().join("test.db")))
            .await
            .unwrap();
        let db = manager.connection().clone();
        (dir, db)
    }
}
