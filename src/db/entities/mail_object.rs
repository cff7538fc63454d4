use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metadata document of a stored message or folder marker
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mail_objects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub namespace: String,
    pub account: String,
    #[sea_orm(column_type = "Text")]
    pub path: String,
    /// "M" for messages, "D" for folder markers
    pub kind: String,
    pub uid: Option<i64>,
    #[sea_orm(column_type = "Text")]
    pub filename: String,
    pub flags: String,
    pub size: i64,
    pub md5: String,
    pub sha256: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub headers: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modified_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::mail_payload::Entity")]
    Payload,
}

impl Related<super::mail_payload::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payload.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
