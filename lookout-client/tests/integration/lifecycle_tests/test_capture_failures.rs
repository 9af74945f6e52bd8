use lookout_client::ClientError;
use lookout_core::{Envelope, EnvelopeType};
use std::sync::Arc;

use crate::integration::{create_test_client, create_test_client_with, init_tracing};
use crate::utils::{DeniedCapture, FakeCapture};

#[tokio::test]
async fn test_denied_capture_aborts_streaming() {
    init_tracing();
    let h = create_test_client_with(Arc::new(DeniedCapture), FakeCapture::new());
    let mut conn = h.connect().await;

    let err = h.client.start_streaming("room-42").await.unwrap_err();
    assert!(matches!(err, ClientError::CaptureDenied(_)));

    let frames = conn.collect_for(300).await;
    assert!(frames.iter().all(|e| e.kind != EnvelopeType::Join));
    assert!(h.client.local_peer_id().is_none());
}

#[tokio::test]
async fn test_rejected_join_releases_capture() {
    init_tracing();
    let h = create_test_client();
    let mut conn = h.connect().await;

    let relay = async {
        conn.recv_kind(EnvelopeType::Join).await;
        conn.send(Envelope::error("room is full"));
    };
    let (res, _) = tokio::join!(h.client.start_streaming("room-42"), relay);

    assert_eq!(res.unwrap_err(), ClientError::JoinRejected("room is full".into()));
    assert_eq!(h.capture.tracks().len(), 2);
    assert!(h.capture.all_stopped());
    assert!(h.observer.local_streams().is_empty());

    // The room slot is free again.
    let (res, _) = tokio::join!(
        h.client.join_as_viewer("room-42"),
        crate::utils::answer_join(&mut conn, "room-42", "v1", vec![])
    );
    res.expect("second join succeeds");
}

#[tokio::test]
async fn test_relay_error_outside_join_reaches_observer() {
    init_tracing();
    let h = create_test_client();
    let mut conn = h.connect().await;

    let (res, _) = tokio::join!(
        h.client.join_as_viewer("room-42"),
        crate::utils::answer_join(&mut conn, "room-42", "v1", vec![])
    );
    res.expect("join succeeds");

    conn.send(Envelope::error("unknown target"));
    let observer = h.observer.clone();
    assert!(
        crate::utils::wait_until(5000, move || {
            let observer = observer.clone();
            async move { !observer.errors().is_empty() }
        })
        .await
    );
    assert_eq!(
        h.observer.errors(),
        vec![ClientError::Relay("unknown target".into())]
    );
}
