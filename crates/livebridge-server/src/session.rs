//! One websocket client.
//!
//! A session registers a subscriber on open (receiving the replay history
//! first), pumps queued deltas to the socket as frames and removes the
//! subscriber when the socket closes, errors or the server shuts down.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use livebridge_core::Dispatcher;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Prefix of the reply sent for every inbound client message.
pub const ECHO_PREFIX: &str = "Message received: ";

/// Deltas are JSON, so they normally go out as text frames.
pub fn delta_frame(payload: Bytes) -> Message {
    match std::str::from_utf8(&payload) {
        Ok(text) => Message::Text(text.into()),
        Err(_) => Message::Binary(payload),
    }
}

/// Reply for an inbound frame. Control frames get none.
pub fn echo_reply(message: &Message) -> Option<Message> {
    match message {
        Message::Text(text) => Some(Message::Text(
            format!("{ECHO_PREFIX}{}", text.as_str()).into(),
        )),
        Message::Binary(data) => Some(Message::Text(
            format!("{ECHO_PREFIX}{}", String::from_utf8_lossy(data)).into(),
        )),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

pub async fn run_session(socket: WebSocket, dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) {
    let (subscriber, mut queue) = dispatcher.new_subscriber();
    let id = subscriber.id();
    dispatcher.on_subscriber_join(subscriber);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            queued = queue.recv() => {
                let Some(payload) = queued else { break };
                if let Err(e) = sink.send(delta_frame(payload)).await {
                    debug!(event = "server.session.send_failed", subscriber_id = %id, error = %e);
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(message)) => {
                        if let Some(reply) = echo_reply(&message)
                            && let Err(e) = sink.send(reply).await
                        {
                            debug!(event = "server.session.send_failed", subscriber_id = %id, error = %e);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(event = "server.session.recv_failed", subscriber_id = %id, error = %e);
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    dispatcher.remove_subscriber(id);
    info!(event = "server.session.closed", subscriber_id = %id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_delta_is_text_frame() {
        let frame = delta_frame(Bytes::from_static(br#"{"drivers":[1,2]}"#));
        match frame {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"drivers":[1,2]}"#),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn test_non_utf8_delta_is_binary_frame() {
        let frame = delta_frame(Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(frame, Message::Binary(_)));
    }

    #[test]
    fn test_echo_text() {
        let reply = echo_reply(&Message::Text("hello".into())).unwrap();
        match reply {
            Message::Text(text) => assert_eq!(text.as_str(), "Message received: hello"),
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[test]
    fn test_echo_binary_as_text() {
        let reply = echo_reply(&Message::Binary(Bytes::from_static(b"ping?"))).unwrap();
        match reply {
            Message::Text(text) => assert_eq!(text.as_str(), "Message received: ping?"),
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[test]
    fn test_control_frames_get_no_reply() {
        assert!(echo_reply(&Message::Ping(Bytes::new())).is_none());
        assert!(echo_reply(&Message::Pong(Bytes::new())).is_none());
        assert!(echo_reply(&Message::Close(None)).is_none());
    }
}
