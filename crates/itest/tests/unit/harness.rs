use itest::it::NAME_PREFIX;
use itest::itest_docker::mock::Op;
use itest::SharedDatabase;

use crate::common::{FakeDatabase, mock_it};

#[tokio::test]
async fn test_network_is_created_and_removed_last() {
    let (mock, it) = mock_it().await;
    assert_eq!(mock.ops(), vec![Op::CreateNetwork(it.prefix().to_string())]);
    assert!(it.prefix().starts_with(NAME_PREFIX));

    let rdb: SharedDatabase = FakeDatabase::new();
    let instance = it.notifications_instance(rdb, &[]).await.unwrap();
    assert_eq!(instance.container_name(), format!("{}-notifications-1", it.prefix()));

    it.cleanup().await;

    let ops = mock.ops();
    assert_eq!(ops.last(), Some(&Op::RemoveNetwork(it.network_id().to_string())));
    assert!(ops.iter().any(|op| matches!(op, Op::RemoveContainer(_))));
    assert!(mock.containers().is_empty());
    assert!(mock.networks().is_empty());
}

#[tokio::test]
async fn test_webhook_receiver_listens_on_gateway() {
    let (_mock, it) = mock_it().await;

    let receiver = it.webhook_receiver().await.unwrap();
    assert_eq!(receiver.local_addr().ip().to_string(), "127.0.0.1");

    let res = reqwest::get(receiver.url()).await.unwrap();
    assert_eq!(res.status().as_u16(), 503);

    it.cleanup().await;
    assert!(reqwest::get(receiver.url()).await.is_err());
}

#[tokio::test]
async fn test_cleanup_twice_is_harmless() {
    let (mock, it) = mock_it().await;
    it.cleanup().await;
    it.cleanup().await;

    let removals = mock
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::RemoveNetwork(_)))
        .count();
    assert_eq!(removals, 1);
}
