use crate::binding::Binding;
use crate::error::AccessControlError;
use crate::types::ResourcePermission;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Permission row entity
///
/// Table `permissions`; one row per (org, binding, resource tuple).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    /// UUID v7
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub org_id: i64,

    /// 'user' | 'team' | 'built_in_role'
    pub binding_kind: String,

    /// User/team id as text, or the built-in role name
    pub binding_id: String,

    pub resource: String,

    pub resource_id: String,

    pub resource_attribute: String,

    /// JSON array of action names, sorted and deduplicated
    pub actions: String,

    pub permission: Option<String>,

    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub created_at: ChronoDateTimeWithTimeZone,

    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::org::Entity",
        from = "Column::OrgId",
        to = "super::org::Column::Id",
        on_delete = "Cascade"
    )]
    Org,
}

impl Related<super::org::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Org.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn binding(&self) -> crate::error::Result<Binding> {
        Binding::from_storage(&self.binding_kind, &self.binding_id)
    }

    pub fn decode_actions(&self) -> crate::error::Result<Vec<String>> {
        serde_json::from_str(&self.actions).map_err(|e| {
            AccessControlError::Storage(format!(
                "Corrupt actions column on permission {}: {}",
                self.id, e
            ))
        })
    }

    pub fn encode_actions(actions: &[String]) -> crate::error::Result<String> {
        serde_json::to_string(actions)
            .map_err(|e| AccessControlError::storage("Failed to encode actions", e))
    }
}

impl TryFrom<Model> for ResourcePermission {
    type Error = AccessControlError;

    fn try_from(model: Model) -> std::result::Result<Self, Self::Error> {
        let binding = model.binding().map_err(|e| {
            AccessControlError::Storage(format!("Corrupt binding on permission {}: {}", model.id, e))
        })?;
        let actions = model.decode_actions()?;

        Ok(ResourcePermission {
            id: model.id,
            org_id: model.org_id,
            binding,
            resource: model.resource,
            resource_id: model.resource_id,
            resource_attribute: model.resource_attribute,
            actions,
            permission: model.permission,
            created: model.created_at.with_timezone(&chrono::Utc),
            updated: model.updated_at.with_timezone(&chrono::Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(binding_kind: &str, binding_id: &str, actions: &str) -> Model {
        Model {
            id: "test-id".to_string(),
            org_id: 1,
            binding_kind: binding_kind.to_string(),
            binding_id: binding_id.to_string(),
            resource: "dashboards".to_string(),
            resource_id: "1".to_string(),
            resource_attribute: "id".to_string(),
            actions: actions.to_string(),
            permission: Some("Edit".to_string()),
            created_at: chrono::Utc::now().into(),
            updated_at: chrono::Utc::now().into(),
        }
    }

    #[test]
    fn test_model_into_resource_permission() {
        let permission: ResourcePermission =
            model("team", "3", r#"["dashboards:read","dashboards:write"]"#)
                .try_into()
                .unwrap();

        assert_eq!(permission.binding, Binding::team(3));
        assert_eq!(permission.actions.len(), 2);
        assert_eq!(permission.scope(), "dashboards:id:1");
        assert_eq!(permission.permission.as_deref(), Some("Edit"));
    }

    #[test]
    fn test_corrupt_rows_are_storage_errors() {
        let bad_actions: crate::error::Result<ResourcePermission> = model("user", "1", "not json").try_into();
        assert_eq!(
            bad_actions.unwrap_err().kind(),
            crate::error::ErrorKind::Storage
        );

        let bad_binding: crate::error::Result<ResourcePermission> = model("robot", "1", "[]").try_into();
        assert_eq!(
            bad_binding.unwrap_err().kind(),
            crate::error::ErrorKind::Storage
        );
    }

    #[test]
    fn test_encode_actions() {
        let encoded = Model::encode_actions(&["a:b".to_string()]).unwrap();
        assert_eq!(encoded, r#"["a:b"]"#);
    }
}
