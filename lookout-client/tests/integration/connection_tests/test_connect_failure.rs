use lookout_client::ClientError;
use lookout_core::ConnectionState;
use std::time::Duration;

use crate::integration::{create_test_client, init_tracing};

#[tokio::test(start_paused = true)]
async fn test_initial_connect_failure_is_not_retried() {
    init_tracing();
    let h = create_test_client();
    h.relay.refuse_next(1);

    let err = h.client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::SignalingUnavailable(_)));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.relay.attempts().len(), 1);
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert!(h.observer.errors().is_empty());

    let _conn = h.connect().await;
    assert_eq!(h.relay.attempts().len(), 2);
}
