//! Query pipeline: collection → includes → filter → order.
//!
//! A [`ListQuery`] only describes the optional steps. The repository turns it
//! into a `Select<E>` in that fixed order and materializes the result before
//! returning, so no lazy query object leaves a repository call.

use std::fmt;

use sea_orm::sea_query::{IntoCondition, Order, SimpleExpr};
use sea_orm::{
    Condition, EntityTrait, IntoSimpleExpr, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select,
};

use crate::entity::RepoEntity;

type SelectStep<E> = Box<dyn Fn(Select<E>) -> Select<E> + Send + Sync>;

/// Related data to bring into the primary query.
///
/// Joins make related columns available to filters and ordering on
/// [`list`](crate::Repository::list). Loading the related rows themselves is
/// done by [`SeaOrmRepository::list_with_related`](crate::SeaOrmRepository::list_with_related).
pub struct Include<E: EntityTrait> {
    label: String,
    step: SelectStep<E>,
}

impl<E: EntityTrait> Include<E> {
    /// LEFT JOIN along a relation of `E`.
    pub fn join<R>(relation: R) -> Self
    where
        R: RelationTrait + fmt::Debug + Send + Sync + 'static,
    {
        Self::join_as(JoinType::LeftJoin, relation)
    }

    /// INNER JOIN along a relation of `E`; rows without a match are dropped.
    pub fn inner_join<R>(relation: R) -> Self
    where
        R: RelationTrait + fmt::Debug + Send + Sync + 'static,
    {
        Self::join_as(JoinType::InnerJoin, relation)
    }

    /// Arbitrary query-shaping step, for joins or selections SeaORM
    /// expresses differently.
    pub fn with<F>(label: impl Into<String>, step: F) -> Self
    where
        F: Fn(Select<E>) -> Select<E> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            step: Box::new(step),
        }
    }

    fn join_as<R>(kind: JoinType, relation: R) -> Self
    where
        R: RelationTrait + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            label: format!("{kind:?}({relation:?})"),
            step: Box::new(move |select| select.join(kind, relation.def())),
        }
    }

    fn apply(&self, select: Select<E>) -> Select<E> {
        (self.step)(select)
    }
}

impl<E: EntityTrait> fmt::Debug for Include<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Include").field(&self.label).finish()
    }
}

/// Optional includes, filter and ordering for a listing.
///
/// The order key is any column or expression: a column of `E`, a column of
/// a joined entity, or a computed `Expr`. Ordering defaults to ascending.
/// The primary key is appended as a tiebreaker in the same direction, so a
/// descending listing is the exact reverse of the ascending one.
pub struct ListQuery<E: EntityTrait> {
    includes: Vec<Include<E>>,
    filter: Option<Condition>,
    order_by: Option<SimpleExpr>,
    ascending: bool,
}

impl<E: EntityTrait> Default for ListQuery<E> {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            filter: None,
            order_by: None,
            ascending: true,
        }
    }
}

impl<E: EntityTrait> ListQuery<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, include: Include<E>) -> Self {
        self.includes.push(include);
        self
    }

    /// Restrict the rows returned. Repeated calls are AND-ed together.
    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        let next = filter.into_condition();
        self.filter = Some(match self.filter.take() {
            Some(prev) => Condition::all().add(prev).add(next),
            None => next,
        });
        self
    }

    /// Ascending order on `key`.
    pub fn order_by<K: IntoSimpleExpr>(mut self, key: K) -> Self {
        self.order_by = Some(key.into_simple_expr());
        self.ascending = true;
        self
    }

    /// Descending order on `key`.
    pub fn order_by_desc<K: IntoSimpleExpr>(mut self, key: K) -> Self {
        self.order_by = Some(key.into_simple_expr());
        self.ascending = false;
        self
    }

    /// Set the direction without changing the order key.
    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }
}

impl<E: RepoEntity> ListQuery<E> {
    /// Count query: the filter only, no includes or ordering.
    pub(crate) fn count_select(&self) -> Select<E> {
        apply_filter(E::find(), self.filter.clone())
    }

    /// Full pipeline. Without an order column the rows come back in
    /// whatever order the database picks.
    pub(crate) fn into_select(mut self) -> Select<E> {
        let ascending = self.ascending;
        let order_by = self.order_by.take();
        let select = self.shape();
        match order_by {
            Some(key) => apply_order::<E>(select, key, ascending),
            None => select,
        }
    }

    /// Full pipeline for paging: falls back to primary-key order so
    /// consecutive pages partition the filtered set.
    pub(crate) fn into_paged_select(mut self) -> Select<E> {
        let ascending = self.ascending;
        let order_by = self.order_by.take();
        let select = self.shape();
        match order_by {
            Some(key) => apply_order::<E>(select, key, ascending),
            None => select.order_by(E::id_column(), direction(ascending)),
        }
    }

    /// Drop join includes, for callers that do their own joining.
    pub(crate) fn without_includes(mut self) -> Self {
        self.includes.clear();
        self
    }

    fn shape(self) -> Select<E> {
        let mut select = E::find();
        for include in &self.includes {
            select = include.apply(select);
        }
        apply_filter(select, self.filter)
    }
}

impl<E: EntityTrait> fmt::Debug for ListQuery<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListQuery")
            .field("includes", &self.includes)
            .field("filter", &self.filter)
            .field("order_by", &self.order_by)
            .field("ascending", &self.ascending)
            .finish()
    }
}

fn apply_filter<E: EntityTrait>(select: Select<E>, filter: Option<Condition>) -> Select<E> {
    match filter {
        Some(cond) => select.filter(cond),
        None => select,
    }
}

fn apply_order<E: RepoEntity>(select: Select<E>, key: SimpleExpr, ascending: bool) -> Select<E> {
    let dir = direction(ascending);
    let tiebreaker = E::id_column().into_simple_expr();
    let needs_tiebreaker = key != tiebreaker;

    let select = select.order_by(key, dir.clone());
    if needs_tiebreaker {
        select.order_by(tiebreaker, dir)
    } else {
        select
    }
}

fn direction(ascending: bool) -> Order {
    if ascending {
        Order::Asc
    } else {
        Order::Desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::{Alias, Expr};
    use sea_orm::{DbBackend, QueryTrait};

    mod widget {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "widgets")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: i32,
            pub name: String,
            pub weight: i32,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}

        impl crate::RepoEntity for Entity {
            type Id = i32;
            fn id_column() -> Column {
                Column::Id
            }
            fn id_of(model: &Model) -> i32 {
                model.id
            }
        }
    }

    fn sql(select: Select<widget::Entity>) -> String {
        select.build(DbBackend::Sqlite).to_string()
    }

    #[test]
    fn empty_query_selects_everything_unordered() {
        let q = ListQuery::<widget::Entity>::new();
        assert_eq!(
            sql(q.into_select()),
            r#"SELECT "widgets"."id", "widgets"."name", "widgets"."weight" FROM "widgets""#
        );
    }

    #[test]
    fn order_gets_primary_key_tiebreaker_in_same_direction() {
        let q = ListQuery::<widget::Entity>::new().order_by_desc(widget::Column::Weight);
        let s = sql(q.into_select());
        assert!(
            s.ends_with(r#"ORDER BY "widgets"."weight" DESC, "widgets"."id" DESC"#),
            "{s}"
        );
    }

    #[test]
    fn ordering_by_primary_key_does_not_repeat_it() {
        let q = ListQuery::<widget::Entity>::new().order_by(widget::Column::Id);
        let s = sql(q.into_select());
        assert!(s.ends_with(r#"ORDER BY "widgets"."id" ASC"#), "{s}");
    }

    #[test]
    fn order_by_expression_outside_the_entity() {
        let owner_name = Expr::col((Alias::new("owners"), Alias::new("name")));
        let q = ListQuery::<widget::Entity>::new().order_by_desc(owner_name);
        let s = sql(q.into_select());
        assert!(
            s.ends_with(r#"ORDER BY "owners"."name" DESC, "widgets"."id" DESC"#),
            "{s}"
        );
    }

    #[test]
    fn paged_select_defaults_to_primary_key_order() {
        let q = ListQuery::<widget::Entity>::new();
        let s = sql(q.into_paged_select());
        assert!(s.ends_with(r#"ORDER BY "widgets"."id" ASC"#), "{s}");
    }

    #[test]
    fn repeated_filters_are_and_ed() {
        let q = ListQuery::<widget::Entity>::new()
            .filter(widget::Column::Weight.gt(10))
            .filter(widget::Column::Name.starts_with("a"));
        let s = sql(q.into_select());
        assert!(s.contains(r#""widgets"."weight" > 10"#), "{s}");
        assert!(s.contains(" AND "), "{s}");
        assert!(s.contains(r#""widgets"."name" LIKE 'a%'"#), "{s}");
    }

    #[test]
    fn count_select_ignores_includes_and_order() {
        let q = ListQuery::<widget::Entity>::new()
            .include(Include::with("distinct", |s: Select<widget::Entity>| {
                s.distinct()
            }))
            .filter(widget::Column::Weight.lt(5))
            .order_by(widget::Column::Name);
        let s = sql(q.count_select());
        assert!(!s.contains("DISTINCT"), "{s}");
        assert!(!s.contains("ORDER BY"), "{s}");
        assert!(s.contains(r#""widgets"."weight" < 5"#), "{s}");
    }

    #[test]
    fn includes_run_before_filter_and_order() {
        let q = ListQuery::<widget::Entity>::new()
            .include(Include::with("distinct", |s: Select<widget::Entity>| {
                s.distinct()
            }))
            .order_by(widget::Column::Name);
        let s = sql(q.into_select());
        assert!(s.starts_with("SELECT DISTINCT"), "{s}");
    }

    #[test]
    fn ascending_flag_flips_direction_only() {
        let q = ListQuery::<widget::Entity>::new()
            .order_by(widget::Column::Weight)
            .ascending(false);
        assert!(!q.is_ascending());
        let s = sql(q.into_select());
        assert!(s.contains(r#""widgets"."weight" DESC"#), "{s}");
    }
}
