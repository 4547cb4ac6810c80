#![cfg(unix)]

use std::net::SocketAddr;
use std::time::Duration;

use breba_pty_client::AsyncPtyClient;
use breba_pty_server::PtyServer;
use breba_pty_server::ServerError;
use pretty_assertions::assert_eq;
use tokio::task::JoinHandle;

async fn start_server() -> (SocketAddr, JoinHandle<Result<(), ServerError>>) {
    let server = PtyServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = tokio::spawn(server.serve());
    (addr, handle)
}

async fn connected_client(addr: SocketAddr) -> AsyncPtyClient {
    let mut client = AsyncPtyClient::new(addr);
    client.connect().await.unwrap();
    client
}

/// Pull raw chunks until `needle` shows up in the collected text.
async fn collect_until(client: &mut AsyncPtyClient, needle: &str) -> String {
    let mut collected = String::new();
    for _ in 0..100 {
        if let Some(chunk) = client.next_chunk(Duration::from_millis(200)).await {
            collected.push_str(&chunk);
            if collected.contains(needle) {
                break;
            }
        }
    }
    collected
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_fresh_session_streams_echo_output_and_marker() {
    let (addr, _server) = start_server().await;
    let mut client = connected_client(addr).await;

    assert!(
        client
            .send_message(r#"{"command": "echo Hello", "command_id": "test"}"#)
            .await
    );
    let transcript = collect_until(&mut client, "Completed test").await;
    assert_eq!(transcript, "$ echo Hello\nHello\nCompleted test\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shell_state_persists_across_commands_in_arrival_order() {
    let (addr, _server) = start_server().await;
    let mut client = connected_client(addr).await;

    assert!(
        client
            .send_message(r#"{"command": "export MY=Hello", "command_id": "test1"}"#)
            .await
    );
    assert!(
        client
            .send_message(r#"{"command": "echo $MY", "command_id": "test2"}"#)
            .await
    );
    let transcript = collect_until(&mut client, "Completed test2").await;
    assert_eq!(
        transcript,
        "$ export MY=Hello\nCompleted test1\n$ echo $MY\nHello\nCompleted test2\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_slow_command_finishes_before_the_next_one_starts() {
    let (addr, _server) = start_server().await;
    let mut client = connected_client(addr).await;

    assert!(
        client
            .send_message(r#"{"command": "sleep 0.3 && echo one", "command_id": "s1"}"#)
            .await
    );
    assert!(
        client
            .send_message(r#"{"command": "echo two", "command_id": "s2"}"#)
            .await
    );
    let transcript = collect_until(&mut client, "Completed s2").await;
    assert_eq!(
        transcript,
        "$ sleep 0.3 && echo one\none\nCompleted s1\n$ echo two\ntwo\nCompleted s2\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn input_reaches_a_prompting_command() {
    let (addr, _server) = start_server().await;
    let mut client = connected_client(addr).await;

    assert!(
        client
            .send_message(
                r#"{"command": "read -p \"Proceed? \" answer && echo \"got $answer\"", "command_id": "ask"}"#
            )
            .await
    );
    let prompt = collect_until(&mut client, "Proceed? ").await;
    assert!(prompt.contains("Proceed? "), "prompt missing: {prompt:?}");

    assert!(client.send_input("yes").await);
    let rest = collect_until(&mut client, "Completed ask").await;
    assert!(rest.contains("got yes\nCompleted ask\n"), "unexpected: {rest:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quit_acks_and_stops_the_listener() {
    let (addr, server) = start_server().await;
    let mut client = connected_client(addr).await;

    let mut response = client.send_quit().await.expect("quit should send");
    let ack = response.text(Duration::from_secs(1)).await;
    assert_eq!(ack, "Server will shut down now.");

    server.await.unwrap().unwrap();
    let mut second = AsyncPtyClient::new(addr);
    assert!(second.connect().await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_directives_get_a_reply_and_service_continues() {
    let (addr, _server) = start_server().await;
    let mut client = connected_client(addr).await;

    assert!(client.send_message("this is not json").await);
    let reply = collect_until(&mut client, "Invalid directive:").await;
    assert!(reply.starts_with("Invalid directive:"), "unexpected: {reply:?}");

    assert!(
        client
            .send_message(r#"{"command": "echo ok", "command_id": "after"}"#)
            .await
    );
    let transcript = collect_until(&mut client, "Completed after").await;
    assert!(
        transcript.contains("$ echo ok\nok\nCompleted after\n"),
        "unexpected: {transcript:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_second_connection_gets_a_fresh_shell() {
    let (addr, _server) = start_server().await;

    let mut first = connected_client(addr).await;
    assert!(
        first
            .send_message(r#"{"command": "export FRESH=no", "command_id": "c1"}"#)
            .await
    );
    collect_until(&mut first, "Completed c1").await;
    first.disconnect().await;

    let mut second = connected_client(addr).await;
    assert!(
        second
            .send_message(r#"{"command": "echo VAR=$FRESH", "command_id": "c2"}"#)
            .await
    );
    let transcript = collect_until(&mut second, "Completed c2").await;
    assert_eq!(transcript, "$ echo VAR=$FRESH\nVAR=\nCompleted c2\n");
}
