use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mail_payloads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub object_id: Uuid,
    pub data: Vec<u8>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mail_object::Entity",
        from = "Column::ObjectId",
        to = "super::mail_object::Column::Id"
    )]
    MailObject,
}

impl Related<super::mail_object::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MailObject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
