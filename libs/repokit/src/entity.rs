//! Capabilities the repository needs from entities and connections.

use std::fmt::Debug;
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Value};

/// An entity addressable by a single-column identifier.
///
/// Construction of an empty record and setting its identifier come from
/// SeaORM itself (`ActiveModelTrait::default` + `set`); this trait only names
/// the identifier column and how to read it from a model.
///
/// ```rust,ignore
/// impl repokit::RepoEntity for Entity {
///     type Id = Uuid;
///     fn id_column() -> Column { Column::Id }
///     fn id_of(model: &Model) -> Uuid { model.id }
/// }
/// ```
pub trait RepoEntity: EntityTrait {
    /// Identifier type. Immutable once assigned.
    ///
    /// `Default::default()` is the "not assigned yet" key: on an
    /// auto-increment table `create` lets the database generate the key
    /// only when the model carries this value.
    type Id: Clone + Debug + Default + PartialEq + Into<Value> + Send + Sync + 'static;

    /// Primary key column.
    fn id_column() -> Self::Column;

    /// Identifier of a loaded model.
    fn id_of(model: &Self::Model) -> Self::Id;
}

/// Anything that can lend a SeaORM connection for the duration of a call.
///
/// Implemented for pooled connections, transactions, and shared or borrowed
/// handles to either, so a repository can live as long as the pool or only
/// as long as one unit of work.
pub trait ConnectionSource: Send + Sync {
    type Conn: ConnectionTrait;

    fn connection(&self) -> &Self::Conn;
}

impl ConnectionSource for DatabaseConnection {
    type Conn = DatabaseConnection;

    #[inline]
    fn connection(&self) -> &Self::Conn {
        self
    }
}

impl ConnectionSource for DatabaseTransaction {
    type Conn = DatabaseTransaction;

    #[inline]
    fn connection(&self) -> &Self::Conn {
        self
    }
}

impl<T> ConnectionSource for &T
where
    T: ConnectionSource + ?Sized,
{
    type Conn = T::Conn;

    #[inline]
    fn connection(&self) -> &Self::Conn {
        (**self).connection()
    }
}

impl<T> ConnectionSource for Arc<T>
where
    T: ConnectionSource + ?Sized,
{
    type Conn = T::Conn;

    #[inline]
    fn connection(&self) -> &Self::Conn {
        (**self).connection()
    }
}
