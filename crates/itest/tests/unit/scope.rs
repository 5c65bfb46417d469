use itest::itest_docker::mock::Op;
use itest::SharedDatabase;

use crate::common::{FakeDatabase, mock_it};

#[tokio::test]
async fn test_scope_cleans_up_its_own_handles() {
    let (mock, it) = mock_it().await;

    let scope = it.scope("test_scope_cleans_up_its_own_handles");
    let rdb: SharedDatabase = FakeDatabase::new();
    let instance = scope.notifications_instance(rdb, &[]).await.unwrap();
    assert_eq!(scope.pending(), 1);
    assert!(mock.container_by_name(instance.container_name()).is_some());

    scope.cleanup().await;
    assert_eq!(scope.pending(), 0);
    assert!(mock.container_by_name(instance.container_name()).is_none());
    assert!(!mock.networks().is_empty());

    it.cleanup().await;
    let removals = mock
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::RemoveContainer(_)))
        .count();
    assert_eq!(removals, 1);
}

#[tokio::test]
async fn test_scope_webhook_receiver_stops_on_scope_cleanup() {
    let (_mock, it) = mock_it().await;
    let scope = it.scope("webhook");

    let receiver = scope.webhook_receiver().await.unwrap();
    let url = receiver.url();
    scope.cleanup().await;
    assert!(reqwest::get(&url).await.is_err());

    it.cleanup().await;
}
