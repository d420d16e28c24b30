use sea_orm::entity::prelude::*;

/// A collection officer reporting to a manager. The pair is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "hierarchies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub manager_id: Uuid,
    #[sea_orm(indexed)]
    pub collection_officer_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ManagerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Manager,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CollectionOfficerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    CollectionOfficer,
}

impl ActiveModelBehavior for ActiveModel {}
