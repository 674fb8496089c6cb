//! Collaborative channel integration tests.
//!
//! These tests start a real server on an ephemeral port and connect real
//! WebSocket clients to it.

use std::sync::Arc;

use texcollab::api::{create_router_with_auth, create_router_with_state, AppState};
use texcollab::compile::LatexCompiler;
use texcollab::security::TokenStore;
use texcollab::session::{ChannelConfig, KeyMode, SessionKey};
use texcollab::store::{MemoryProjectStore, DEFAULT_CONTENT};
use texcollab::{CollabClient, CollabError, ConnectionStatus};
use tokio::time::{sleep, timeout, Duration};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(200);

fn state(echo: bool) -> AppState {
    AppState::from_parts(
        Arc::new(MemoryProjectStore::new()),
        Arc::new(LatexCompiler::new(
            std::env::temp_dir().join("texcollab-channel-tests"),
        )),
        ChannelConfig {
            echo_to_sender: echo,
            ..ChannelConfig::default()
        },
    )
}

/// Serve `router` on a free port, return the base `ws://` URL.
async fn start(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("ws://{}", addr)
}

/// The upgrade completes before the server registers the participant.
async fn wait_for_participants(state: &AppState, key: &SessionKey, count: usize) {
    timeout(WAIT, async {
        while state.registry.participant_count(key) != count {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("participants did not settle");
}

async fn recv(client: &mut CollabClient) -> String {
    timeout(WAIT, client.recv())
        .await
        .expect("timed out waiting for a snapshot")
        .expect("connection ended")
}

#[tokio::test]
async fn test_peer_receives_snapshot_sender_does_not() {
    let state = state(false);
    let base = start(create_router_with_state(state.clone())).await;
    let key = SessionKey::file("proj1", "main.tex");

    let mut alice = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    let mut bob = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    wait_for_participants(&state, &key, 2).await;

    alice.send("\\section{Intro}").unwrap();

    assert_eq!(recv(&mut bob).await, "\\section{Intro}");
    assert!(timeout(QUIET, alice.recv()).await.is_err());
}

#[tokio::test]
async fn test_echo_to_sender() {
    let state = state(true);
    let base = start(create_router_with_state(state.clone())).await;
    let key = SessionKey::file("proj1", "main.tex");

    let mut alice = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    let mut bob = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    wait_for_participants(&state, &key, 2).await;

    alice.send("\\section{Intro}").unwrap();

    assert_eq!(recv(&mut bob).await, "\\section{Intro}");
    assert_eq!(recv(&mut alice).await, "\\section{Intro}");
}

#[tokio::test]
async fn test_default_file_shares_session_with_explicit_path() {
    let state = state(false);
    let base = start(create_router_with_state(state.clone())).await;
    let key = SessionKey::file("proj1", "main.tex");

    let alice = CollabClient::connect(&format!("{}/ws/proj1", base))
        .await
        .unwrap();
    let mut bob = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    wait_for_participants(&state, &key, 2).await;

    alice.send("a").unwrap();
    assert_eq!(recv(&mut bob).await, "a");
}

#[tokio::test]
async fn test_per_sender_order() {
    let state = state(false);
    let base = start(create_router_with_state(state.clone())).await;
    let key = SessionKey::file("proj1", "main.tex");

    let alice = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    let mut bob = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    wait_for_participants(&state, &key, 2).await;

    for i in 0..10 {
        alice.send(format!("v{}", i)).unwrap();
    }
    for i in 0..10 {
        assert_eq!(recv(&mut bob).await, format!("v{}", i));
    }
}

#[tokio::test]
async fn test_no_cross_delivery_between_files() {
    let state = state(false);
    let base = start(create_router_with_state(state.clone())).await;

    let main = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    let mut intro = CollabClient::connect(&format!("{}/ws/proj1/intro.tex", base))
        .await
        .unwrap();
    wait_for_participants(&state, &SessionKey::file("proj1", "main.tex"), 1).await;
    wait_for_participants(&state, &SessionKey::file("proj1", "intro.tex"), 1).await;

    main.send("only main").unwrap();
    assert!(timeout(QUIET, intro.recv()).await.is_err());
}

#[tokio::test]
async fn test_project_key_mode_spans_files() {
    let state = state(false).with_key_mode(KeyMode::Project);
    let base = start(create_router_with_state(state.clone())).await;

    let main = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    let mut intro = CollabClient::connect(&format!("{}/ws/proj1/intro.tex", base))
        .await
        .unwrap();
    wait_for_participants(&state, &SessionKey::project("proj1"), 2).await;

    main.send("shared").unwrap();
    assert_eq!(recv(&mut intro).await, "shared");
}

#[tokio::test]
async fn test_initial_content_and_persistence() {
    let state = state(false);
    let project = state.store.create_project("Thesis", "user1").unwrap();
    let base = start(create_router_with_state(state.clone())).await;
    let url = format!("{}/ws/{}/main.tex", base, project.id);

    let mut alice = CollabClient::connect(&url).await.unwrap();
    assert_eq!(recv(&mut alice).await, DEFAULT_CONTENT);

    alice.send("\\section{Edited}").unwrap();
    timeout(WAIT, async {
        while state.store.load_document(&project.id, "main.tex").unwrap() != "\\section{Edited}" {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("edit was not persisted");

    let mut carol = CollabClient::connect(&url).await.unwrap();
    assert_eq!(recv(&mut carol).await, "\\section{Edited}");
}

#[tokio::test]
async fn test_new_file_created_on_first_edit() {
    let state = state(false);
    let project = state.store.create_project("Thesis", "user1").unwrap();
    let base = start(create_router_with_state(state.clone())).await;
    let key = SessionKey::file(project.id.as_str(), "intro.tex");

    let alice = CollabClient::connect(&format!("{}/ws/{}/intro.tex", base, project.id))
        .await
        .unwrap();
    wait_for_participants(&state, &key, 1).await;

    alice.send("\\section{Intro}").unwrap();
    timeout(WAIT, async {
        while state.store.load_document(&project.id, "intro.tex").is_err() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("file was not created");
}

#[tokio::test]
async fn test_disconnect_discards_session() {
    let state = state(false);
    let base = start(create_router_with_state(state.clone())).await;
    let key = SessionKey::file("proj1", "main.tex");

    let alice = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    let bob = CollabClient::connect(&format!("{}/ws/proj1/main.tex", base))
        .await
        .unwrap();
    wait_for_participants(&state, &key, 2).await;

    alice.close().await;
    wait_for_participants(&state, &key, 1).await;

    let status = bob.watch_status();
    assert_eq!(*status.borrow(), ConnectionStatus::Connected);
    bob.close().await;

    timeout(WAIT, async {
        while state.registry.contains(&key) {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session was not discarded");
    assert_eq!(*status.borrow(), ConnectionStatus::Closed);
    assert_eq!(state.registry.session_count(), 0);
}

#[tokio::test]
async fn test_close_reports_closed_status() {
    let state = state(false);
    let base = start(create_router_with_state(state)).await;

    let client = CollabClient::connect(&format!("{}/ws/proj1", base))
        .await
        .unwrap();
    let mut status = client.watch_status();
    let watcher = tokio::spawn(async move {
        status
            .wait_for(|s| *s != ConnectionStatus::Connected)
            .await
            .map(|s| *s)
    });

    client.close().await;
    assert_eq!(
        timeout(WAIT, watcher).await.unwrap().unwrap().unwrap(),
        ConnectionStatus::Closed
    );
}

#[tokio::test]
async fn test_token_required_on_socket() {
    let tokens = TokenStore::default();
    tokens.add_token("secret");
    let state = state(false);
    let base = start(create_router_with_auth(state.clone(), Arc::new(tokens))).await;
    let url = format!("{}/ws/proj1/main.tex", base);

    let rejected = CollabClient::connect(&url).await;
    assert!(matches!(rejected, Err(CollabError::ConnectionRejected(_))));

    let with_header = CollabClient::connect_with_token(&url, "secret").await;
    assert!(with_header.is_ok());

    let with_query = CollabClient::connect(&format!("{}?token=secret", url)).await;
    assert!(with_query.is_ok());
}

#[tokio::test]
async fn test_server_completes_closing_handshake() {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let state = state(false);
    let base = start(create_router_with_state(state.clone())).await;
    let key = SessionKey::file("proj1", "main.tex");

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("{}/ws/proj1", base))
        .await
        .unwrap();
    wait_for_participants(&state, &key, 1).await;

    socket.send(Message::Close(None)).await.unwrap();
    let reply = timeout(WAIT, socket.next()).await.expect("no reply to close");
    assert!(matches!(reply, Some(Ok(Message::Close(_)))));
    wait_for_participants(&state, &key, 0).await;
}
