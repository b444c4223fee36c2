//! Unit of work: one database transaction per logical scope.

use async_trait::async_trait;
use repokit::{RepoEntity, SeaOrmRepository};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use tracing::debug;

use crate::{DbHandle, Result};

/// An open transaction. Repositories taken from it write inside the
/// transaction; nothing is visible to other connections until
/// [`commit`](Self::commit). Dropping it without committing rolls back.
pub struct UnitOfWork {
    tx: DatabaseTransaction,
}

impl UnitOfWork {
    pub fn new(tx: DatabaseTransaction) -> Self {
        Self { tx }
    }

    /// Repository bound to this transaction.
    pub fn repository<E: RepoEntity>(&self) -> SeaOrmRepository<E, &DatabaseTransaction> {
        SeaOrmRepository::new(&self.tx)
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        &self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        debug!("unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        debug!("unit of work rolled back");
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").finish_non_exhaustive()
    }
}

/// Opens units of work. This is what gets registered in the hub.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<UnitOfWork>;
}

#[async_trait]
impl UnitOfWorkFactory for DbHandle {
    async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self.sea().begin().await?;
        debug!(engine = ?self.engine(), "unit of work started");
        Ok(UnitOfWork::new(tx))
    }
}
