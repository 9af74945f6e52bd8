use lookout_client::ClientError;
use lookout_core::{ConnectionState, EnvelopeType, Role};

use crate::integration::{create_test_client, init_tracing};
use crate::utils::{answer_join, room, wait_for_state};

#[tokio::test]
async fn test_connect_then_disconnect() {
    init_tracing();
    let h = create_test_client();
    assert_eq!(h.client.state(), ConnectionState::New);

    let mut conn = h.connect().await;
    assert_eq!(h.client.state(), ConnectionState::Disconnected);

    h.client.disconnect().await;
    conn.wait_closed().await;

    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert_eq!(
        h.observer.states(),
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );
    assert_eq!(h.relay.attempts().len(), 1);
}

#[tokio::test]
async fn test_connect_while_open_replaces_the_connection() {
    init_tracing();
    let h = create_test_client();
    let mut first = h.connect().await;

    let _second = h.connect().await;
    assert_eq!(h.relay.attempts().len(), 2);
    first.wait_closed().await;
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_while_joined_rejoins_on_the_new_connection() {
    init_tracing();
    let h = create_test_client();
    let mut first = h.connect().await;
    let (res, _) = tokio::join!(
        h.client.join_as_viewer("room-42"),
        answer_join(&mut first, "room-42", "v1", vec![])
    );
    res.expect("join succeeds");

    let mut second = h.connect().await;
    first.wait_closed().await;

    let join = second.recv_kind(EnvelopeType::Join).await;
    assert_eq!(join.room_id, Some(room("room-42")));
    assert_eq!(join.payload.as_ref().unwrap()["isStreamer"], false);

    let membership = h.client.membership().expect("still a member");
    assert_eq!(membership.room_id, room("room-42"));
    assert_eq!(membership.local_role, Role::Viewer);
}

#[tokio::test]
async fn test_join_requires_connection() {
    init_tracing();
    let h = create_test_client();

    let err = h.client.join_as_viewer("room-42").await.unwrap_err();
    assert_eq!(err, ClientError::NotConnected);

    let err = h.client.start_streaming("room-42").await.unwrap_err();
    assert_eq!(err, ClientError::NotConnected);
    assert!(h.capture.all_stopped(), "capture must be released");
}

#[tokio::test]
async fn test_blank_room_is_rejected() {
    init_tracing();
    let h = create_test_client();
    let _conn = h.connect().await;

    assert_eq!(
        h.client.join_as_viewer("  ").await.unwrap_err(),
        ClientError::InvalidRoom
    );
    assert!(h.capture.tracks().is_empty());
}

#[tokio::test]
async fn test_viewer_join_sends_role_and_records_identity() {
    init_tracing();
    let h = create_test_client();
    let mut conn = h.connect().await;

    let (res, join) = tokio::join!(
        h.client.join_as_viewer("room-42"),
        answer_join(&mut conn, "room-42", "v1", vec![])
    );
    res.expect("join succeeds");

    assert_eq!(join.kind, EnvelopeType::Join);
    assert_eq!(join.room_id, Some(room("room-42")));
    assert_eq!(join.payload.as_ref().unwrap()["isStreamer"], Role::Viewer.is_streamer());
    assert_eq!(h.client.local_peer_id().map(|p| p.0), Some("v1".to_owned()));

    let err = h.client.join_as_viewer("room-43").await.unwrap_err();
    assert_eq!(err, ClientError::AlreadyJoined("room-42".to_owned()));

    h.client.leave_room().await;
    assert_eq!(conn.recv_kind(EnvelopeType::Leave).await.room_id, Some(room("room-42")));
    assert!(h.client.local_peer_id().is_none());
    assert!(wait_for_state(&h.client, ConnectionState::Disconnected).await);
}
