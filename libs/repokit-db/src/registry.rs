//! Type-keyed service registry and persistence registration.
//!
//! Providers register an `Arc<T>` once, usually with `T = dyn Trait`;
//! consumers fetch by that interface type. Entries live under a scope
//! (`global` unless named), so e.g. tenants can get their own database.
//! Re-registering replaces the entry; `Arc`s already handed out stay valid.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use repokit::{RepoEntity, Repository};
use sea_orm::IntoActiveModel;

use crate::uow::UnitOfWorkFactory;
use crate::DbHandle;

pub const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, thiserror::Error)]
pub enum ClientHubError {
    #[error("nothing registered for type={type_name}, scope={scope}")]
    NotFound {
        type_name: &'static str,
        scope: String,
    },

    #[error("type mismatch in hub for type={type_name}, scope={scope}")]
    TypeMismatch {
        type_name: &'static str,
        scope: String,
    },
}

type Key = (&'static str, Arc<str>);
type Boxed = Box<dyn Any + Send + Sync>;

/// Registry of shared services keyed by (interface type, scope).
#[derive(Default)]
pub struct ClientHub {
    map: RwLock<HashMap<Key, Boxed>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&self, client: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_scoped::<T>(GLOBAL_SCOPE, client);
    }

    pub fn register_scoped<T>(&self, scope: impl Into<Arc<str>>, client: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = (type_name::<T>(), scope.into());
        tracing::debug!(type_name = key.0, scope = %key.1, "registered client");
        self.map.write().insert(key, Box::new(client));
    }

    pub fn get<T>(&self) -> Result<Arc<T>, ClientHubError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_scoped::<T>(GLOBAL_SCOPE)
    }

    pub fn get_scoped<T>(&self, scope: impl Into<Arc<str>>) -> Result<Arc<T>, ClientHubError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = (type_name::<T>(), scope.into());
        let map = self.map.read();
        let boxed = map.get(&key).ok_or_else(|| ClientHubError::NotFound {
            type_name: key.0,
            scope: key.1.to_string(),
        })?;

        // Values are stored as exactly `Arc<T>`.
        boxed
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| ClientHubError::TypeMismatch {
                type_name: key.0,
                scope: key.1.to_string(),
            })
    }

    /// Remove an entry, returning it if present.
    pub fn remove<T>(&self, scope: impl Into<Arc<str>>) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = (type_name::<T>(), scope.into());
        let boxed = self.map.write().remove(&key)?;
        boxed.downcast::<Arc<T>>().ok().map(|b| *b)
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

/// Register `factory` as the global `dyn UnitOfWorkFactory`.
///
/// Consumers resolve it with [`persistence`] and open one unit of work per
/// request or operation.
pub fn register_persistence<F>(hub: &ClientHub, factory: Arc<F>)
where
    F: UnitOfWorkFactory + 'static,
{
    let factory: Arc<dyn UnitOfWorkFactory> = factory;
    hub.register::<dyn UnitOfWorkFactory>(factory);
}

/// The registered persistence context.
pub fn persistence(hub: &ClientHub) -> Result<Arc<dyn UnitOfWorkFactory>, ClientHubError> {
    hub.get::<dyn UnitOfWorkFactory>()
}

/// Register an autocommitting `dyn Repository<E>` over the handle's pool.
pub fn register_repository<E>(hub: &ClientHub, handle: &DbHandle)
where
    E: RepoEntity,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    let repo: Arc<dyn Repository<E>> = Arc::new(handle.repository::<E>());
    hub.register::<dyn Repository<E>>(repo);
}
