//! Create/read/update/delete against SQLite.

mod common;

use common::{item, setup};
use repokit::{CancellationToken, RepoError, Repository, SeaOrmRepository};
use sea_orm::{DatabaseConnection, DbErr};
use tracing_test::traced_test;

fn items(db: DatabaseConnection) -> SeaOrmRepository<item::Entity, DatabaseConnection> {
    SeaOrmRepository::new(db)
}

#[tokio::test]
async fn create_then_get_returns_equal_record() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();

    let created = repo
        .create(Some(item::new(1, "alpha", 10)), &cancel)
        .await
        .unwrap();
    assert_eq!(created, item::new(1, "alpha", 10));

    let fetched = repo.get_by_id(1, &cancel).await.unwrap();
    assert_eq!(fetched, Some(item::new(1, "alpha", 10)));
}

#[tokio::test]
async fn returned_models_are_detached_snapshots() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();
    repo.create(Some(item::new(1, "alpha", 10)), &cancel)
        .await
        .unwrap();

    let mut first = repo.get_by_id(1, &cancel).await.unwrap().unwrap();
    first.name = "changed locally".into();
    first.val = -1;

    let second = repo.get_by_id(1, &cancel).await.unwrap().unwrap();
    assert_eq!(second, item::new(1, "alpha", 10));
}

#[tokio::test]
async fn get_missing_id_is_none() {
    let repo = items(setup().await.unwrap());
    let found = repo.get_by_id(999, &CancellationToken::new()).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn update_overwrites_the_whole_record() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();
    repo.create(Some(item::new(7, "before", 1)), &cancel)
        .await
        .unwrap();

    let updated = repo
        .update(Some(item::new(7, "after", 2)), &cancel)
        .await
        .unwrap();
    assert_eq!(updated, item::new(7, "after", 2));
    assert_eq!(
        repo.get_by_id(7, &cancel).await.unwrap(),
        Some(item::new(7, "after", 2))
    );
}

#[tokio::test]
async fn update_of_missing_record_surfaces_the_database_error() {
    let repo = items(setup().await.unwrap());
    let err = repo
        .update(Some(item::new(42, "ghost", 0)), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, RepoError::Db(DbErr::RecordNotUpdated)),
        "{err:?}"
    );
}

#[tokio::test]
async fn delete_removes_the_row() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();
    let created = repo
        .create(Some(item::new(3, "gone soon", 0)), &cancel)
        .await
        .unwrap();

    repo.delete(Some(created.clone()), &cancel).await.unwrap();
    assert!(repo.get_by_id(3, &cancel).await.unwrap().is_none());

    let again = repo.delete(Some(created), &cancel).await.unwrap_err();
    assert!(again.is_not_found());
}

#[tokio::test]
async fn delete_by_id_removes_without_loading() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();
    repo.create(Some(item::new(5, "x", 0)), &cancel)
        .await
        .unwrap();

    repo.delete_by_id(5, &cancel).await.unwrap();
    assert!(!repo.exists(5, &cancel).await.unwrap());
}

#[tokio::test]
async fn delete_by_id_of_missing_row_is_not_found() {
    let repo = items(setup().await.unwrap());
    let err = repo
        .delete_by_id(999, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, RepoError::NotFound { table } if table == "items"),
        "{err:?}"
    );
}

#[tokio::test]
async fn absent_entity_is_an_argument_error() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();

    let create = repo.create(None, &cancel).await.unwrap_err();
    let update = repo.update(None, &cancel).await.unwrap_err();
    let delete = repo.delete(None, &cancel).await.unwrap_err();
    for err in [create, update, delete] {
        assert!(
            matches!(err, RepoError::InvalidArgument("entity")),
            "{err:?}"
        );
    }
}

#[tokio::test]
async fn duplicate_key_is_a_database_error() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();
    repo.create(Some(item::new(1, "a", 0)), &cancel)
        .await
        .unwrap();

    let err = repo
        .create(Some(item::new(1, "b", 0)), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "{err:?}");
    assert_eq!(repo.count(None, &cancel).await.unwrap(), 1);
}

#[tokio::test]
async fn cancelled_token_stops_the_call() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = repo
        .create(Some(item::new(1, "never", 0)), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    let live = CancellationToken::new();
    assert_eq!(repo.count(None, &live).await.unwrap(), 0);
}

#[tokio::test]
#[traced_test]
async fn operations_are_traced_with_their_table() {
    let repo = items(setup().await.unwrap());
    let cancel = CancellationToken::new();
    repo.create(Some(item::new(1, "traced", 0)), &cancel)
        .await
        .unwrap();
    repo.get_by_id(1, &cancel).await.unwrap();

    assert!(logs_contain("repokit.repo.create"));
    assert!(logs_contain("repokit.repo.get_by_id"));
    assert!(logs_contain("table=items"));
}
