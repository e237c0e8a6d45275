//! Public API tests for `wsbridge::create_stream`.

use futures::{SinkExt, StreamExt};
use wsbridge::prelude::*;
use wsbridge::recording::{RecordingSocket, SocketCall};

#[compio::test]
async fn test_reads_until_peer_close_then_half_closes() {
    wsbridge::dev_tracing::init_tracing();

    let socket = RecordingSocket::new(ReadyState::Open);
    let probe = socket.probe();
    let (peer, socket_events) = socket_event_channel();
    let (mut stream, driver) = create_stream(socket, StreamOptions::default(), socket_events);
    let monitor = stream.subscribe();

    for chunk in ["hello", " ", "world"] {
        peer.send(SocketEvent::Message(Bytes::from(chunk))).unwrap();
    }
    // Empty messages carry nothing to read
    peer.send(SocketEvent::Message(Bytes::new())).unwrap();

    let client = async move {
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
            if received.len() == 11 {
                probe.set_ready_state(ReadyState::Closed);
                peer.send(SocketEvent::Close).unwrap();
            }
        }
        assert_eq!(received, b"hello world");
        assert!(!stream.is_destroyed());

        // Socket already closed, so the transport's write side is done
        probe.set_write_finished(true);
        stream.close().await.unwrap();
        assert_eq!(probe.count(&SocketCall::Close), 0);

        // Nothing more can be written after the half-close
        assert!(stream.send(Bytes::from_static(b"late")).await.is_err());
        stream
    };

    let (driven, stream) = futures::join!(driver.run(), client);
    driven.unwrap();
    assert!(stream.is_closed());

    let events: Vec<_> = monitor.try_iter().collect();
    assert!(events.iter().any(|e| matches!(e, StreamEvent::End)));
    assert!(events.iter().any(|e| matches!(e, StreamEvent::Finish)));
    assert!(matches!(events.last(), Some(StreamEvent::Close)));
}

#[compio::test]
async fn test_driver_returns_when_event_feed_closes() {
    let socket = RecordingSocket::new(ReadyState::Connecting);
    let (peer, socket_events) = socket_event_channel();
    let (stream, driver) = create_stream(socket, StreamOptions::default(), socket_events);

    drop(peer);
    driver.run().await.unwrap();
    assert!(!stream.is_closed());
}
