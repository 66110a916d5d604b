//! Permissions table
//!
//! The unique index over the binding and resource tuple is what makes
//! assignment an upsert.

use super::m20240101_000001_create_directory_tables::Orgs;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permissions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Permissions::OrgId).big_integer().not_null())
                    .col(ColumnDef::new(Permissions::BindingKind).string().not_null())
                    .col(ColumnDef::new(Permissions::BindingId).string().not_null())
                    .col(ColumnDef::new(Permissions::Resource).string().not_null())
                    .col(ColumnDef::new(Permissions::ResourceId).string().not_null())
                    .col(ColumnDef::new(Permissions::ResourceAttribute).string().not_null())
                    .col(ColumnDef::new(Permissions::Actions).text().not_null())
                    .col(ColumnDef::new(Permissions::Permission).string())
                    .col(
                        ColumnDef::new(Permissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Permissions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_permissions_org_id")
                            .from(Permissions::Table, Permissions::OrgId)
                            .to(Orgs::Table, Orgs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permissions_binding_resource")
                    .table(Permissions::Table)
                    .col(Permissions::OrgId)
                    .col(Permissions::BindingKind)
                    .col(Permissions::BindingId)
                    .col(Permissions::Resource)
                    .col(Permissions::ResourceId)
                    .col(Permissions::ResourceAttribute)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permissions_resource")
                    .table(Permissions::Table)
                    .col(Permissions::OrgId)
                    .col(Permissions::Resource)
                    .col(Permissions::ResourceAttribute)
                    .col(Permissions::ResourceId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Id,
    OrgId,
    BindingKind,
    BindingId,
    Resource,
    ResourceId,
    ResourceAttribute,
    Actions,
    Permission,
    CreatedAt,
    UpdatedAt,
}
