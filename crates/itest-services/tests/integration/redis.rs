use std::sync::Arc;

use itest_services::RedisCreator;

use super::docker_network;

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_server_answers_commands() {
    let (runtime, settings, prefix, network) = docker_network().await;
    let creator = RedisCreator::new(Arc::clone(&runtime), settings, &format!("{prefix}-redis"), &network);

    let server = creator.create_server().await.unwrap();
    assert_eq!(creator.running(), 1);

    let client = server.open().unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("SET").arg("k").arg("v").query_async(&mut conn).await.unwrap();
    let value: String = redis::cmd("GET").arg("k").query_async(&mut conn).await.unwrap();
    assert_eq!(value, "v");

    creator.cleanup().await.unwrap();
    assert_eq!(creator.running(), 0);
    runtime.remove_network(&network).await.unwrap();
}
