//! Generic repository over SeaORM.
//!
//! One parameterized type, [`SeaOrmRepository<E, C>`], gives any entity `E`
//! the same CRUD, filtered listing and page-number pagination surface. Query
//! execution and persistence are delegated to SeaORM; the crate only composes
//! the query pipeline and validates arguments.
//!
//! # Snapshots, not tracked entities
//! SeaORM keeps no identity map or change tracker. Every model handed out by
//! the repository is an owned snapshot, fully materialized before the call
//! returns, so nothing stays attached to the connection afterwards and
//! mutating a returned model never leaks into later reads.
//!
//! # Example
//! ```rust,no_run
//! use repokit::{CancellationToken, ListQuery, Repository, SeaOrmRepository};
//! # use sea_orm::entity::prelude::*;
//! # mod note {
//! #     use sea_orm::entity::prelude::*;
//! #     #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
//! #     #[sea_orm(table_name = "notes")]
//! #     pub struct Model {
//! #         #[sea_orm(primary_key)]
//! #         pub id: i32,
//! #         pub title: String,
//! #     }
//! #     #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
//! #     pub enum Relation {}
//! #     impl ActiveModelBehavior for ActiveModel {}
//! #     impl repokit::RepoEntity for Entity {
//! #         type Id = i32;
//! #         fn id_column() -> Column { Column::Id }
//! #         fn id_of(model: &Model) -> i32 { model.id }
//! #     }
//! # }
//! # async fn demo(db: sea_orm::DatabaseConnection) -> repokit::RepoResult<()> {
//! let repo = SeaOrmRepository::<note::Entity, _>::new(db);
//! let cancel = CancellationToken::new();
//!
//! let page = repo
//!     .list_paged(1, 20, ListQuery::new().order_by(note::Column::Title), &cancel)
//!     .await?;
//! println!("{} of {} notes", page.items.len(), page.total_items);
//! # Ok(())
//! # }
//! ```

mod cancel;
pub mod entity;
pub mod error;
pub mod page;
pub mod query;
pub mod repository;

pub use entity::{ConnectionSource, RepoEntity};
pub use error::{RepoError, RepoResult};
pub use page::PagedResult;
pub use query::{Include, ListQuery};
pub use repository::{Repository, SeaOrmRepository};

pub use tokio_util::sync::CancellationToken;
