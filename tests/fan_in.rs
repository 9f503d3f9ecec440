//! End-to-end behaviour of the accept loop, readers and message queue.

use std::collections::HashMap;
use std::time::Duration;

use fanin_server::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{send_acked, start_server, test_config, within, ACK};

#[tokio::test]
async fn two_clients_are_tagged_with_their_addresses() {
    let mut server = start_server(test_config()).await;
    let mut messages = server.messages.take().unwrap();

    let mut client1 = TcpStream::connect(server.addr).await.unwrap();
    let mut client2 = TcpStream::connect(server.addr).await.unwrap();
    client1.write_all(b"hello").await.unwrap();
    client2.write_all(b"world").await.unwrap();

    let mut seen = HashMap::new();
    for _ in 0..2 {
        let message = within(messages.recv()).await.unwrap();
        seen.insert(message.payload().to_vec(), message.origin().to_string());
    }

    assert_eq!(seen[&b"hello".to_vec()], client1.local_addr().unwrap().to_string());
    assert_eq!(seen[&b"world".to_vec()], client2.local_addr().unwrap().to_string());

    server.shutdown.trigger();
    within(server.task).await.unwrap();
}

#[tokio::test]
async fn chunks_from_one_connection_arrive_in_order() {
    let mut server = start_server(test_config()).await;
    let mut messages = server.messages.take().unwrap();
    let mut client = TcpStream::connect(server.addr).await.unwrap();

    for chunk in [&b"A"[..], &b"B"[..], &b"C"[..]] {
        send_acked(&mut client, chunk).await;
    }

    for expected in [&b"A"[..], &b"B"[..], &b"C"[..]] {
        let message = within(messages.recv()).await.unwrap();
        assert_eq!(message.payload().as_ref(), expected);
    }

    server.shutdown.trigger();
    within(server.task).await.unwrap();
}

#[tokio::test]
async fn no_ack_written_when_disabled() {
    let mut config = test_config();
    config.connection.acknowledge = false;
    let mut server = start_server(config).await;
    let mut messages = server.messages.take().unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(b"quiet").await.unwrap();
    assert_eq!(within(messages.recv()).await.unwrap().payload().as_ref(), b"quiet");

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_millis(100), client.read(&mut buf)).await;
    assert!(read.is_err(), "server wrote to the client");

    server.shutdown.trigger();
    within(server.task).await.unwrap();
}

#[tokio::test]
async fn full_queue_blocks_the_publisher() {
    let mut config = test_config();
    config.queue.capacity = 10;
    let mut server = start_server(config).await;
    let mut messages = server.messages.take().unwrap();
    let mut client = TcpStream::connect(server.addr).await.unwrap();

    for i in 0..10u8 {
        send_acked(&mut client, &[b'0' + i]).await;
    }
    assert_eq!(messages.len(), 10);

    // The eleventh read cannot be published, so no acknowledgement comes back.
    client.write_all(b"overflow").await.unwrap();
    let mut ack = vec![0u8; ACK.len()];
    let blocked = tokio::time::timeout(Duration::from_millis(150), client.read_exact(&mut ack)).await;
    assert!(blocked.is_err(), "publisher was not blocked");
    assert!(messages.len() <= messages.capacity());

    // Draining one slot releases the reader.
    assert_eq!(within(messages.recv()).await.unwrap().payload().as_ref(), b"0");
    within(client.read_exact(&mut ack)).await.unwrap();
    assert_eq!(ack, ACK);

    let mut rest = Vec::new();
    while let Ok(message) = messages.try_recv() {
        rest.push(message.payload().to_vec());
    }
    assert_eq!(rest.len(), 10);
    assert_eq!(rest.last().unwrap(), b"overflow");

    server.shutdown.trigger();
    within(server.task).await.unwrap();
}

#[tokio::test]
async fn shutdown_closes_connections_and_queue() {
    let mut server = start_server(test_config()).await;
    let mut messages = server.messages.take().unwrap();
    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send_acked(&mut client, b"before shutdown").await;

    server.shutdown.trigger();
    within(server.task).await.unwrap();
    assert_eq!(server.tracker.active_count(), 0);

    // Messages published before shutdown are still delivered, then the
    // consumer loop ends.
    let mut drained = Vec::new();
    while let Some(message) = within(messages.recv()).await {
        drained.push(message);
    }
    assert_eq!(drained.len(), 1);
    assert!(messages.is_closed());

    let mut buf = [0u8; 8];
    assert_eq!(within(client.read(&mut buf)).await.unwrap(), 0);
}

#[tokio::test]
async fn listener_is_released_after_shutdown() {
    let server = start_server(test_config()).await;
    let addr = server.addr;

    server.shutdown.trigger();
    within(server.task).await.unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn closed_peer_releases_its_reader() {
    let mut server = start_server(test_config()).await;
    let mut messages = server.messages.take().unwrap();

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    send_acked(&mut client, b"bye").await;
    assert_eq!(server.tracker.active_count(), 1);
    drop(client);

    within(server.tracker.wait_idle()).await;
    assert_eq!(within(messages.recv()).await.unwrap().payload().as_ref(), b"bye");

    server.shutdown.trigger();
    within(server.task).await.unwrap();
}

#[tokio::test]
async fn connection_cap_holds_back_extra_clients() {
    let mut config = test_config();
    config.listener.max_connections = Some(1);
    let mut server = start_server(config).await;
    let mut messages = server.messages.take().unwrap();

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    send_acked(&mut first, b"first").await;

    // The kernel completes the handshake, but the server does not accept
    // the second connection while the first holds the only slot.
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    second.write_all(b"second").await.unwrap();
    let mut ack = vec![0u8; ACK.len()];
    let held = tokio::time::timeout(Duration::from_millis(150), second.read_exact(&mut ack)).await;
    assert!(held.is_err(), "second connection was served early");

    drop(first);
    within(second.read_exact(&mut ack)).await.unwrap();
    assert_eq!(ack, ACK);

    let payloads: Vec<_> = [within(messages.recv()).await, within(messages.recv()).await]
        .into_iter()
        .map(|m| m.unwrap().payload().to_vec())
        .collect();
    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);

    server.shutdown.trigger();
    within(server.task).await.unwrap();
}

#[tokio::test]
async fn inline_mode_has_no_queue() {
    let mut config = test_config();
    config.queue.enabled = false;

    let mut server = Server::new(config);
    assert!(server.take_messages().is_none());

    let bound = server.bind().await.unwrap();
    let shutdown = bound.shutdown_handle();
    let addr = bound.local_addr();
    let task = tokio::spawn(bound.run());

    let mut client = TcpStream::connect(addr).await.unwrap();
    send_acked(&mut client, b"logged, not queued").await;

    shutdown.trigger();
    within(task).await.unwrap();
}

#[tokio::test]
async fn messages_can_only_be_taken_once() {
    let mut server = Server::new(test_config());
    assert!(server.take_messages().is_some());
    assert!(server.take_messages().is_none());
}
