use std::future::Future;

use sea_orm::DbErr;
use tokio_util::sync::CancellationToken;

use crate::error::{RepoError, RepoResult};

/// Drive a database future unless `cancel` fires first.
///
/// An already-cancelled token short-circuits without polling `fut`, so no
/// statement is sent.
pub(crate) async fn run_cancellable<T, F>(cancel: &CancellationToken, fut: F) -> RepoResult<T>
where
    F: Future<Output = Result<T, DbErr>>,
{
    if cancel.is_cancelled() {
        return Err(RepoError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RepoError::Cancelled),
        res = fut => res.map_err(RepoError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_token_never_polls_the_future() {
        let polled = AtomicBool::new(false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = run_cancellable(&cancel, async {
            polled.store(true, Ordering::SeqCst);
            Ok::<_, DbErr>(1)
        })
        .await;

        assert!(matches!(res, Err(RepoError::Cancelled)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_work() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let res = run_cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, DbErr>(())
        })
        .await;

        assert!(res.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn db_errors_are_wrapped() {
        let cancel = CancellationToken::new();
        let res: RepoResult<()> =
            run_cancellable(&cancel, async { Err(DbErr::Custom("down".into())) }).await;
        assert!(matches!(res, Err(RepoError::Db(DbErr::Custom(msg))) if msg == "down"));
    }
}
