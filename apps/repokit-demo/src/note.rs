//! Sample entity the demo seeds and lists.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub body: String,
    pub pinned: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl repokit::RepoEntity for Entity {
    type Id = i32;

    fn id_column() -> Column {
        Column::Id
    }

    fn id_of(model: &Model) -> i32 {
        model.id
    }
}

/// Unsaved note; the id is assigned by the database.
pub fn draft(title: impl Into<String>, body: impl Into<String>, pinned: bool) -> Model {
    Model {
        id: 0,
        title: title.into(),
        body: body.into(),
        pinned,
    }
}
