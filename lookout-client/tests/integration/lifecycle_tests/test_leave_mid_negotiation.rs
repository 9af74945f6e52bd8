use lookout_client::SessionState;
use lookout_core::{ConnectionState, Envelope, EnvelopeType, PeerId};

use crate::integration::{create_test_client, init_tracing};
use crate::utils::{
    answer_from, answer_join, candidate_from, offer_from, room, viewer, wait_for_session,
    wait_for_state,
};

#[tokio::test]
async fn test_leave_with_one_connected_and_one_negotiating_peer() {
    init_tracing();
    let h = create_test_client();
    let mut conn = h.connect().await;

    let (res, _) = tokio::join!(
        h.client.start_streaming("room-42"),
        answer_join(&mut conn, "room-42", "s1", vec![viewer("v1"), viewer("v2")])
    );
    let local = res.expect("streaming starts");
    conn.recv_kind(EnvelopeType::Offer).await;
    conn.recv_kind(EnvelopeType::Offer).await;

    conn.send(answer_from("v1", "fake-answer"));
    assert!(wait_for_session(&h.client, "v1", SessionState::Connected).await);
    assert_eq!(
        h.client.session_states().await[&PeerId::from("v2")],
        SessionState::Negotiating
    );
    assert_eq!(h.client.state(), ConnectionState::Connected);

    h.client.leave_room().await;

    // Teardown has completed by the time leave_room returns.
    assert!(h.client.session_states().await.is_empty());
    assert!(local.is_released());
    assert!(h.capture.all_stopped());
    assert!(h.client.local_peer_id().is_none());
    assert_eq!(conn.recv_kind(EnvelopeType::Leave).await.room_id, Some(room("room-42")));

    assert!(h.media.link("v1").unwrap().wait_closes(1).await);
    assert!(h.media.link("v2").unwrap().wait_closes(1).await);

    // Late traffic for the old room creates nothing.
    conn.send(answer_from("v2", "fake-answer"));
    conn.send(candidate_from("v2", "candidate:late"));
    conn.send(Envelope::peer_joined(room("room-42"), PeerId::from("v3"), false));
    conn.send(offer_from("v4", "fake-offer;tracks=video"));
    let frames = conn.collect_for(300).await;

    assert!(frames.is_empty());
    assert!(h.client.session_states().await.is_empty());
    assert_eq!(h.media.opened(), 2);
    assert_eq!(h.media.link("v1").unwrap().closes(), 1);
    assert_eq!(h.media.link("v2").unwrap().closes(), 1);
    assert!(h.observer.errors().is_empty());
    assert!(wait_for_state(&h.client, ConnectionState::Disconnected).await);
}

#[tokio::test]
async fn test_disconnect_releases_everything() {
    init_tracing();
    let h = create_test_client();
    let mut conn = h.connect().await;

    let (res, _) = tokio::join!(
        h.client.start_streaming("room-42"),
        answer_join(&mut conn, "room-42", "s1", vec![viewer("v1")])
    );
    let local = res.expect("streaming starts");
    conn.recv_kind(EnvelopeType::Offer).await;

    h.client.disconnect().await;

    assert!(local.is_released());
    assert!(h.client.session_states().await.is_empty());
    conn.recv_kind(EnvelopeType::Leave).await;
    conn.wait_closed().await;
    assert!(h.media.link("v1").unwrap().wait_closes(1).await);
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_dropping_the_client_releases_capture() {
    init_tracing();
    let h = create_test_client();
    let mut conn = h.connect().await;

    let (res, _) = tokio::join!(
        h.client.start_streaming("room-42"),
        answer_join(&mut conn, "room-42", "s1", vec![viewer("v1")])
    );
    let local = res.expect("streaming starts");
    conn.recv_kind(EnvelopeType::Offer).await;

    let crate::integration::TestHarness { client, media, .. } = h;
    drop(client);

    conn.wait_closed().await;
    assert!(local.is_released());
    assert!(media.link("v1").unwrap().wait_closes(1).await);
}
