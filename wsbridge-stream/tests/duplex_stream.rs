//! Duplex stream integration tests
//!
//! Runs `DuplexStream` and its `Driver` against a recording socket. The test
//! body plays the remote peer: it steers the socket through its probe and
//! reports socket events on the feed.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use wsbridge_core::prelude::*;
use wsbridge_core::recording::{RecordingSocket, SocketCall};
use wsbridge_stream::DuplexStream;

const M1: Bytes = Bytes::from_static(b"M1");
const M2: Bytes = Bytes::from_static(b"M2");
const M3: Bytes = Bytes::from_static(b"M3");
const M4: Bytes = Bytes::from_static(b"M4");
const M5: Bytes = Bytes::from_static(b"M5");

/// Yield to the driver until `cond` holds.
async fn until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        compio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for {what}");
}

#[compio::test]
async fn test_round_trip_with_full_read_buffer() {
    let socket = RecordingSocket::new(ReadyState::Connecting);
    let probe = socket.probe();
    let (peer, socket_events) = socket_event_channel();
    let options = StreamOptions::new().with_read_high_water_mark(2);
    let (mut stream, driver) = DuplexStream::new(socket, options, socket_events);
    let monitor = stream.subscribe();

    let script = async move {
        // Queued behind the opening handshake
        stream.feed(M1).await.unwrap();
        assert!(probe.sent().is_empty());

        probe.set_ready_state(ReadyState::Open);
        peer.send(SocketEvent::Open).unwrap();
        stream.flush().await.unwrap();
        assert_eq!(probe.sent(), vec![M1]);

        // Every message fills the buffer and pauses the transport
        peer.send(SocketEvent::Message(M2)).unwrap();
        until("transport pause", || probe.is_paused()).await;
        assert_eq!(stream.next().await.unwrap().unwrap(), M2);
        assert!(!probe.is_paused());

        stream.send(M3).await.unwrap();
        peer.send(SocketEvent::Message(M4)).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), M4);
        stream.send(M5).await.unwrap();

        // Half-close: the close frame goes out, then the transport finishes
        let transport_finish = async {
            until("close frame", || probe.count(&SocketCall::Close) == 1).await;
            probe.set_write_finished(true);
            peer.send(SocketEvent::TransportFinish).unwrap();
        };
        let (closed, ()) = futures::join!(stream.close(), transport_finish);
        closed.unwrap();

        // Peer answers the close handshake
        probe.set_ready_state(ReadyState::Closed);
        peer.send(SocketEvent::Close).unwrap();
        assert!(stream.next().await.is_none());

        assert_eq!(probe.sent(), vec![M1, M3, M5]);
        assert_eq!(probe.count(&SocketCall::Terminate), 0);
        stream
    };

    let (driven, stream) = futures::join!(driver.run(), script);
    driven.unwrap();
    assert!(stream.is_destroyed());
    assert!(stream.is_closed());

    let events: Vec<_> = monitor.try_iter().collect();
    assert!(
        matches!(
            events.as_slice(),
            [StreamEvent::Finish, StreamEvent::End, StreamEvent::Close]
        ),
        "unexpected events: {events:?}"
    );
}

#[compio::test]
async fn test_writes_while_connecting_replay_in_order() {
    let socket = RecordingSocket::new(ReadyState::Connecting);
    let probe = socket.probe();
    let (peer, socket_events) = socket_event_channel();
    let (mut stream, driver) = DuplexStream::new(socket, StreamOptions::default(), socket_events);

    let script = async move {
        stream.feed(M1).await.unwrap();
        stream.feed(M3).await.unwrap();
        stream.feed(M5).await.unwrap();
        assert_eq!(stream.in_flight_bytes(), 6);

        probe.set_ready_state(ReadyState::Open);
        peer.send(SocketEvent::Open).unwrap();
        stream.flush().await.unwrap();

        assert_eq!(probe.sent(), vec![M1, M3, M5]);
        assert_eq!(stream.in_flight_bytes(), 0);
        assert_eq!(probe.count(&SocketCall::DelegateDrain), 1);
    };

    let (driven, ()) = futures::join!(driver.run(), script);
    driven.unwrap();
}

#[compio::test]
async fn test_resume_waits_for_receiver_drain() {
    let socket = RecordingSocket::new(ReadyState::Open);
    let probe = socket.probe();
    let (peer, socket_events) = socket_event_channel();
    let options = StreamOptions::new().with_read_high_water_mark(2);
    let (mut stream, driver) = DuplexStream::new(socket, options, socket_events);

    let script = async move {
        peer.send(SocketEvent::Message(Bytes::from_static(b"ab"))).unwrap();
        until("transport pause", || probe.is_paused()).await;

        probe.set_needs_drain(true);
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert!(probe.is_paused());

        probe.set_needs_drain(false);
        peer.send(SocketEvent::ReceiverDrain).unwrap();
        until("transport resume", || !probe.is_paused()).await;
        assert_eq!(probe.count(&SocketCall::Resume), 1);
    };

    let (driven, ()) = futures::join!(driver.run(), script);
    driven.unwrap();
}

#[compio::test]
async fn test_destroy_reports_error_then_ends() {
    let socket = RecordingSocket::new(ReadyState::Open);
    let probe = socket.probe();
    let (peer, socket_events) = socket_event_channel();
    let (mut stream, driver) = DuplexStream::new(socket, StreamOptions::default(), socket_events);
    let monitor = stream.subscribe();

    let script = async move {
        stream.destroy(Some(Error::protocol("bad frame")));
        assert_eq!(probe.count(&SocketCall::Terminate), 1);

        probe.set_ready_state(ReadyState::Closed);
        peer.send(SocketEvent::Close).unwrap();

        assert!(matches!(stream.next().await, Some(Err(Error::Protocol(_)))));
        assert!(stream.next().await.is_none());

        stream.destroy(None);
        assert_eq!(probe.count(&SocketCall::Terminate), 1);
    };

    let (driven, ()) = futures::join!(driver.run(), script);
    driven.unwrap();

    let closes = monitor
        .try_iter()
        .filter(|event| matches!(event, StreamEvent::Close))
        .count();
    assert_eq!(closes, 1);
}

#[compio::test]
async fn test_socket_error_lets_close_handshake_finish() {
    let socket = RecordingSocket::new(ReadyState::Open);
    let probe = socket.probe();
    let (peer, socket_events) = socket_event_channel();
    let (mut stream, driver) = DuplexStream::new(socket, StreamOptions::default(), socket_events);

    let script = async move {
        // The socket starts its own close handshake after a protocol error
        probe.set_ready_state(ReadyState::Closing);
        peer.send(SocketEvent::Error(Error::transport("invalid payload")))
            .unwrap();
        until("destroy", || stream.is_destroyed()).await;

        probe.set_ready_state(ReadyState::Closed);
        peer.send(SocketEvent::Close).unwrap();

        assert!(matches!(stream.next().await, Some(Err(Error::Transport(_)))));
        assert!(stream.next().await.is_none());
        assert_eq!(probe.count(&SocketCall::Terminate), 0);
    };

    let (driven, ()) = futures::join!(driver.run(), script);
    driven.unwrap();
}

#[compio::test]
async fn test_unhandled_error_fails_driver() {
    let socket = RecordingSocket::new(ReadyState::Open);
    let probe = socket.probe();
    let (peer, socket_events) = socket_event_channel();
    let (stream, driver) = DuplexStream::new(socket, StreamOptions::default(), socket_events);

    let script = async move {
        drop(stream);
        assert_eq!(probe.count(&SocketCall::Terminate), 1);

        peer.send(SocketEvent::Error(Error::transport("connection reset")))
            .unwrap();
        peer.send(SocketEvent::Close).unwrap();
    };

    let (driven, ()) = futures::join!(driver.run(), script);
    assert!(matches!(driven, Err(Error::Transport(_))));
}

#[compio::test]
async fn test_close_waits_for_pending_writes() {
    let socket = RecordingSocket::new(ReadyState::Open);
    let probe = socket.probe();
    probe.hold_sends(true);
    let (peer, socket_events) = socket_event_channel();
    let (mut stream, driver) = DuplexStream::new(socket, StreamOptions::default(), socket_events);

    let script = async move {
        stream.feed(M1).await.unwrap();

        let acknowledge = async {
            compio::time::sleep(Duration::from_millis(5)).await;
            // Final must not run while a write is still pending
            assert_eq!(probe.count(&SocketCall::Close), 0);
            assert!(probe.complete_send(Ok(())));

            until("close frame", || probe.count(&SocketCall::Close) == 1).await;
            peer.send(SocketEvent::TransportFinish).unwrap();
        };
        let (closed, ()) = futures::join!(stream.close(), acknowledge);
        closed.unwrap();

        let calls = probe.calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            &[SocketCall::Send(M1), SocketCall::Close]
        );
    };

    let (driven, ()) = futures::join!(driver.run(), script);
    driven.unwrap();
}
