//! The repository port and its SeaORM implementation.
//!
//! `SeaOrmRepository` is generic over `C: ConnectionSource`, so it can be
//! built on a pooled `DatabaseConnection` (every save autocommits) or on a
//! `&DatabaseTransaction` borrowed from a unit of work (saves commit with
//! the transaction).

use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, PaginatorTrait,
    PrimaryKeyTrait, QueryFilter, QuerySelect, Related,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::cancel::run_cancellable;
use crate::entity::{ConnectionSource, RepoEntity};
use crate::error::{RepoError, RepoResult};
use crate::page::PagedResult;
use crate::query::ListQuery;

/// CRUD + query surface for one entity type.
///
/// Object-safe via `async_trait`, so hosts can hand out
/// `Arc<dyn Repository<E>>` and tests can swap in fakes.
#[async_trait]
pub trait Repository<E: RepoEntity>: Send + Sync {
    /// Materialized listing: includes → filter → order.
    async fn list(
        &self,
        query: ListQuery<E>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E::Model>>;

    /// `Ok(None)` when no row has this id.
    async fn get_by_id(
        &self,
        id: E::Id,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E::Model>>;

    /// Insert a whole record and return the stored snapshot.
    async fn create(
        &self,
        entity: Option<E::Model>,
        cancel: &CancellationToken,
    ) -> RepoResult<E::Model>;

    /// Overwrite every column of an existing record.
    async fn update(
        &self,
        entity: Option<E::Model>,
        cancel: &CancellationToken,
    ) -> RepoResult<E::Model>;

    async fn delete(&self, entity: Option<E::Model>, cancel: &CancellationToken)
        -> RepoResult<()>;

    /// Delete without loading the row first.
    async fn delete_by_id(&self, id: E::Id, cancel: &CancellationToken) -> RepoResult<()>;

    /// One page of a listing plus the total number of rows matching the
    /// filter. `page_number` is 1-based.
    async fn list_paged(
        &self,
        page_number: u64,
        page_size: u64,
        query: ListQuery<E>,
        cancel: &CancellationToken,
    ) -> RepoResult<PagedResult<E::Model>>;

    /// Rows matching `filter` (all rows when `None`).
    async fn count(&self, filter: Option<Condition>, cancel: &CancellationToken)
        -> RepoResult<u64>;

    async fn exists(&self, id: E::Id, cancel: &CancellationToken) -> RepoResult<bool>;
}

/// SeaORM repository impl.
/// Holds a connection source; its lifetime/ownership is up to the caller.
pub struct SeaOrmRepository<E, C> {
    conn: C,
    _entity: PhantomData<fn() -> E>,
}

impl<E, C> SeaOrmRepository<E, C>
where
    E: RepoEntity,
    C: ConnectionSource,
{
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            _entity: PhantomData,
        }
    }

    pub fn connection(&self) -> &C::Conn {
        self.conn.connection()
    }

    /// Give the connection source back (e.g. to inspect a mock's log).
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Listing with the related `R` rows of every entity eagerly loaded.
    ///
    /// Filter and ordering apply to the primary entity. Join includes are
    /// ignored here: SeaORM already joins `R` to load it.
    #[instrument(
        name = "repokit.repo.list_with_related",
        skip_all,
        fields(table = %table_of::<E>(), related = %table_of::<R>())
    )]
    pub async fn list_with_related<R>(
        &self,
        query: ListQuery<E>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<(E::Model, Vec<R::Model>)>>
    where
        R: EntityTrait,
        E: Related<R>,
    {
        let select = query.without_includes().into_select();
        let rows = run_cancellable(
            cancel,
            select.find_with_related(R::default()).all(self.conn.connection()),
        )
        .await?;
        debug!(rows = rows.len(), "loaded rows with related");
        Ok(rows)
    }
}

impl<E, C> Clone for SeaOrmRepository<E, C>
where
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            _entity: PhantomData,
        }
    }
}

fn table_of<E: EntityTrait>() -> String {
    E::default().table_name().to_owned()
}

/// Largest LIMIT/OFFSET the drivers can bind; they take signed 64-bit ints.
const MAX_BOUND: u64 = i64::MAX as u64;

fn validate_page(page_number: u64, page_size: u64) -> RepoResult<u64> {
    if page_number < 1 {
        return Err(RepoError::OutOfRange {
            name: "page_number",
            value: page_number,
            reason: "must be at least 1",
        });
    }
    if page_size == 0 {
        return Err(RepoError::OutOfRange {
            name: "page_size",
            value: page_size,
            reason: "must be greater than zero",
        });
    }
    if page_size > MAX_BOUND {
        return Err(RepoError::OutOfRange {
            name: "page_size",
            value: page_size,
            reason: "must not exceed i64::MAX",
        });
    }
    (page_number - 1)
        .checked_mul(page_size)
        .filter(|offset| *offset <= MAX_BOUND)
        .ok_or(RepoError::OutOfRange {
            name: "page_number",
            value: page_number,
            reason: "offset exceeds i64::MAX",
        })
}

#[async_trait]
impl<E, C> Repository<E> for SeaOrmRepository<E, C>
where
    E: RepoEntity,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
    C: ConnectionSource,
{
    #[instrument(name = "repokit.repo.list", skip_all, fields(table = %table_of::<E>()))]
    async fn list(
        &self,
        query: ListQuery<E>,
        cancel: &CancellationToken,
    ) -> RepoResult<Vec<E::Model>> {
        let select = query.into_select();
        let rows = run_cancellable(cancel, select.all(self.conn.connection())).await?;
        debug!(rows = rows.len(), "listed rows");
        Ok(rows)
    }

    #[instrument(
        name = "repokit.repo.get_by_id",
        skip_all,
        fields(table = %table_of::<E>(), id = ?id)
    )]
    async fn get_by_id(
        &self,
        id: E::Id,
        cancel: &CancellationToken,
    ) -> RepoResult<Option<E::Model>> {
        let select = E::find().filter(E::id_column().eq(id));
        let found = run_cancellable(cancel, select.one(self.conn.connection())).await?;
        debug!(found = found.is_some(), "looked up row");
        Ok(found)
    }

    #[instrument(name = "repokit.repo.create", skip_all, fields(table = %table_of::<E>()))]
    async fn create(
        &self,
        entity: Option<E::Model>,
        cancel: &CancellationToken,
    ) -> RepoResult<E::Model> {
        let model = entity.ok_or(RepoError::InvalidArgument("entity"))?;

        let unassigned = E::id_of(&model) == E::Id::default();
        let mut am = model.into_active_model().reset_all();
        if unassigned && <E::PrimaryKey as PrimaryKeyTrait>::auto_increment() {
            // Default key on a generated column: the database assigns one.
            am.not_set(E::id_column());
        }

        let created = run_cancellable(cancel, am.insert(self.conn.connection())).await?;
        debug!(id = ?E::id_of(&created), "created row");
        Ok(created)
    }

    #[instrument(name = "repokit.repo.update", skip_all, fields(table = %table_of::<E>()))]
    async fn update(
        &self,
        entity: Option<E::Model>,
        cancel: &CancellationToken,
    ) -> RepoResult<E::Model> {
        let model = entity.ok_or(RepoError::InvalidArgument("entity"))?;

        // Every column is written, not only the changed ones.
        let am = model.into_active_model().reset_all();
        let updated = run_cancellable(cancel, am.update(self.conn.connection())).await?;
        debug!(id = ?E::id_of(&updated), "updated row");
        Ok(updated)
    }

    #[instrument(name = "repokit.repo.delete", skip_all, fields(table = %table_of::<E>()))]
    async fn delete(
        &self,
        entity: Option<E::Model>,
        cancel: &CancellationToken,
    ) -> RepoResult<()> {
        let model = entity.ok_or(RepoError::InvalidArgument("entity"))?;

        let am = model.into_active_model();
        let res = run_cancellable(cancel, am.delete(self.conn.connection())).await?;
        if res.rows_affected == 0 {
            return Err(RepoError::NotFound {
                table: table_of::<E>(),
            });
        }
        debug!("deleted row");
        Ok(())
    }

    #[instrument(
        name = "repokit.repo.delete_by_id",
        skip_all,
        fields(table = %table_of::<E>(), id = ?id)
    )]
    async fn delete_by_id(&self, id: E::Id, cancel: &CancellationToken) -> RepoResult<()> {
        // Stub carrying only the key: no read round-trip before the delete.
        let mut stub = <E::ActiveModel as ActiveModelTrait>::default();
        stub.set(E::id_column(), id.into());

        let res = run_cancellable(cancel, stub.delete(self.conn.connection())).await?;
        if res.rows_affected == 0 {
            return Err(RepoError::NotFound {
                table: table_of::<E>(),
            });
        }
        debug!("deleted row by id");
        Ok(())
    }

    #[instrument(
        name = "repokit.repo.list_paged",
        skip_all,
        fields(table = %table_of::<E>(), page_number = page_number, page_size = page_size)
    )]
    async fn list_paged(
        &self,
        page_number: u64,
        page_size: u64,
        query: ListQuery<E>,
        cancel: &CancellationToken,
    ) -> RepoResult<PagedResult<E::Model>> {
        let offset = validate_page(page_number, page_size)?;

        // Two independent statements: the count may observe a different
        // instant than the page under concurrent writes.
        let count_select = query.count_select();
        let page_select = query
            .into_paged_select()
            .offset(offset)
            .limit(page_size);

        let conn = self.conn.connection();
        let (total_items, items) = run_cancellable(cancel, async move {
            let total = count_select.count(conn).await?;
            let items = page_select.all(conn).await?;
            Ok::<_, sea_orm::DbErr>((total, items))
        })
        .await?;

        debug!(total_items, returned = items.len(), "listed page");
        Ok(PagedResult::new(page_number, page_size, total_items, items))
    }

    #[instrument(name = "repokit.repo.count", skip_all, fields(table = %table_of::<E>()))]
    async fn count(
        &self,
        filter: Option<Condition>,
        cancel: &CancellationToken,
    ) -> RepoResult<u64> {
        let select = match filter {
            Some(cond) => E::find().filter(cond),
            None => E::find(),
        };
        run_cancellable(cancel, select.count(self.conn.connection())).await
    }

    #[instrument(
        name = "repokit.repo.exists",
        skip_all,
        fields(table = %table_of::<E>(), id = ?id)
    )]
    async fn exists(&self, id: E::Id, cancel: &CancellationToken) -> RepoResult<bool> {
        let select = E::find().filter(E::id_column().eq(id));
        let n = run_cancellable(cancel, select.count(self.conn.connection())).await?;
        Ok(n > 0)
    }
}
