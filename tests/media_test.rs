//! Integration tests for audio/video toggles, the host master-control
//! cascade, per-target host controls, and screen share.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_test_server() -> (String, SocketAddr) {
    let state = huddle_server::state::AppState::new(Duration::from_secs(60));
    let app = huddle_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), addr)
}

async fn connect(addr: &SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("WebSocket connect failed");
    ws
}

async fn send(ws: &mut WsClient, event: Value) {
    ws.send(Message::Text(event.to_string().into()))
        .await
        .expect("WebSocket send failed");
}

async fn recv_event(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

async fn recv_until(ws: &mut WsClient, event: &str) -> Value {
    loop {
        let received = recv_event(ws).await;
        if received["event"] == event {
            return received;
        }
    }
}

async fn drain(ws: &mut WsClient) {
    loop {
        match tokio::time::timeout(Duration::from_millis(200), ws.next()).await {
            Ok(Some(Ok(_))) => continue,
            _ => break,
        }
    }
}

async fn expect_silence(ws: &mut WsClient) {
    if let Ok(Some(Ok(Message::Text(text)))) =
        tokio::time::timeout(Duration::from_millis(300), ws.next()).await
    {
        panic!("expected silence, got: {}", text);
    }
}

/// Room of three: alice (host), bob, carol, with join traffic drained.
async fn setup_room(addr: &SocketAddr) -> (String, Vec<WsClient>) {
    let mut clients = Vec::new();
    let mut first = connect(addr).await;
    send(&mut first, json!({ "event": "create-room" })).await;
    let room_id = recv_event(&mut first).await["roomId"]
        .as_str()
        .unwrap()
        .to_string();
    drop(first);

    for name in ["alice", "bob", "carol"] {
        let mut ws = connect(addr).await;
        send(
            &mut ws,
            json!({
                "event": "join",
                "roomId": room_id,
                "username": name,
                "peerId": format!("peer-{name}")
            }),
        )
        .await;
        // Joins are sequential: each member is fully in before the next.
        recv_until(&mut ws, "participant-list").await;
        clients.push(ws);
    }
    for ws in &mut clients {
        drain(ws).await;
    }
    (room_id, clients)
}

#[tokio::test]
async fn self_toggle_notifies_other_participants() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[1],
        json!({
            "event": "toggle-audio",
            "roomId": room_id,
            "peerId": "peer-bob",
            "enabled": false
        }),
    )
    .await;

    for idx in [0, 2] {
        let toggled = recv_until(&mut clients[idx], "audio-toggled").await;
        assert_eq!(toggled["peerId"], "peer-bob");
        assert_eq!(toggled["enabled"], false);
        assert_eq!(toggled["isHostMasterControl"], false);
    }
    // No echo back to the actor.
    expect_silence(&mut clients[1]).await;
}

#[tokio::test]
async fn host_master_audio_cascade_forces_everyone_else() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[0],
        json!({
            "event": "update-host-master-controls",
            "roomId": room_id,
            "controls": { "controlAllAudio": true }
        }),
    )
    .await;
    for ws in &mut clients {
        drain(ws).await;
    }

    // Host mutes itself; the cascade mutes bob and carol too.
    send(
        &mut clients[0],
        json!({
            "event": "toggle-audio",
            "roomId": room_id,
            "peerId": "peer-alice",
            "enabled": false
        }),
    )
    .await;

    for idx in [1, 2] {
        let forced = recv_until(&mut clients[idx], "forced-control").await;
        assert_eq!(forced["media"], "audio");
        assert_eq!(forced["enabled"], false);
        assert_eq!(forced["byUsername"], "alice");

        let toggled = recv_until(&mut clients[idx], "audio-toggled").await;
        assert_eq!(toggled["isHostMasterControl"], true);
        assert_eq!(toggled["peerId"], "peer-alice");

        let system = recv_until(&mut clients[idx], "new-message").await;
        assert_eq!(system["message"]["kind"]["systemType"], "host-action");
    }

    // The host sees the cascade announcement as well.
    let toggled = recv_until(&mut clients[0], "audio-toggled").await;
    assert_eq!(toggled["isHostMasterControl"], true);
}

#[tokio::test]
async fn non_host_toggle_never_cascades_even_with_master_control() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[0],
        json!({
            "event": "update-host-master-controls",
            "roomId": room_id,
            "controls": { "controlAllAudio": true }
        }),
    )
    .await;
    for ws in &mut clients {
        drain(ws).await;
    }

    send(
        &mut clients[1],
        json!({
            "event": "toggle-audio",
            "roomId": room_id,
            "peerId": "peer-bob",
            "enabled": false
        }),
    )
    .await;

    let toggled = recv_until(&mut clients[2], "audio-toggled").await;
    assert_eq!(toggled["isHostMasterControl"], false);
    // No forced-control reaches anyone.
    expect_silence(&mut clients[2]).await;
    expect_silence(&mut clients[1]).await;
}

#[tokio::test]
async fn host_mute_of_one_target_forces_state_and_broadcasts() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[0],
        json!({
            "event": "host-control-audio",
            "roomId": room_id,
            "targetPeerId": "peer-bob",
            "mute": true
        }),
    )
    .await;

    let forced = recv_until(&mut clients[1], "forced-control").await;
    assert_eq!(forced["media"], "audio");
    assert_eq!(forced["enabled"], false);
    assert_eq!(forced["byUsername"], "alice");

    for idx in [0, 2] {
        let toggled = recv_until(&mut clients[idx], "audio-toggled").await;
        assert_eq!(toggled["peerId"], "peer-bob");
        assert_eq!(toggled["enabled"], false);
    }
}

#[tokio::test]
async fn host_unmute_request_does_not_force_state() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[0],
        json!({
            "event": "host-control-audio",
            "roomId": room_id,
            "targetPeerId": "peer-bob",
            "mute": false
        }),
    )
    .await;

    let request = recv_until(&mut clients[1], "control-requested").await;
    assert_eq!(request["media"], "audio");
    assert_eq!(request["byUsername"], "alice");

    // The request is announced, but nobody's state toggles.
    let system = recv_until(&mut clients[2], "new-message").await;
    assert_eq!(system["message"]["kind"]["systemType"], "host-request");
    expect_silence(&mut clients[2]).await;
}

#[tokio::test]
async fn host_control_by_non_host_is_forbidden() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[1],
        json!({
            "event": "host-control-video",
            "roomId": room_id,
            "targetPeerId": "peer-carol",
            "disable": true
        }),
    )
    .await;
    let error = recv_event(&mut clients[1]).await;
    assert_eq!(error["event"], "control-error");
    expect_silence(&mut clients[2]).await;
}

#[tokio::test]
async fn host_control_of_unknown_peer_fails() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[0],
        json!({
            "event": "host-control-audio",
            "roomId": room_id,
            "targetPeerId": "peer-ghost",
            "mute": true
        }),
    )
    .await;
    let error = recv_event(&mut clients[0]).await;
    assert_eq!(error["event"], "control-error");
}

#[tokio::test]
async fn screen_share_is_relayed_and_visible_in_snapshot() {
    let (base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[1],
        json!({
            "event": "screen-share",
            "roomId": room_id,
            "peerId": "peer-bob",
            "isSharing": true
        }),
    )
    .await;

    let shared = recv_until(&mut clients[0], "screen-share-toggled").await;
    assert_eq!(shared["peerId"], "peer-bob");
    assert_eq!(shared["isSharing"], true);

    let snap: Value = reqwest::get(format!("{}/api/rooms/{}", base, room_id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let bob = snap["participants"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["username"] == "bob")
        .unwrap();
    assert_eq!(bob["isScreenSharing"], true);
}

#[tokio::test]
async fn master_control_update_by_non_host_is_refused() {
    let (_base, addr) = start_test_server().await;
    let (room_id, mut clients) = setup_room(&addr).await;

    send(
        &mut clients[1],
        json!({
            "event": "update-host-master-controls",
            "roomId": room_id,
            "controls": { "controlAllVideo": true }
        }),
    )
    .await;
    let error = recv_event(&mut clients[1]).await;
    assert_eq!(error["event"], "control-error");
    expect_silence(&mut clients[0]).await;
}
