#![allow(dead_code)]
//! Shared fixtures: three small entities and an in-memory SQLite database.

use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};

pub mod item {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "items")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub name: String,
        pub val: i32,
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

    pub fn new(id: i32, name: &str, val: i32) -> Model {
        Model {
            id,
            name: name.to_owned(),
            val,
        }
    }
}

pub mod author {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "authors")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::book::Entity")]
        Book,
    }

    impl Related<super::book::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Book.def()
        }
    }

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
}

pub mod book {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "books")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub author_id: i32,
        pub title: String,
        pub pages: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::author::Entity",
            from = "Column::AuthorId",
            to = "super::author::Column::Id"
        )]
        Author,
    }

    impl Related<super::author::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Author.def()
        }
    }

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
}

/// Fresh in-memory database with all fixture tables.
///
/// The pool is pinned to one connection: every SQLite `:memory:` connection
/// is its own database.
pub async fn setup() -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await?;

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    db.execute(backend.build(&schema.create_table_from_entity(item::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(author::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(book::Entity)))
        .await?;
    Ok(db)
}
