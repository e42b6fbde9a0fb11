//! Discord gateway websocket session.
//!
//! One [`GatewaySession::run`] call drives a single connection: hello,
//! identify, heartbeats and dispatch decoding. Reconnection belongs to the
//! caller (see `services::gateway_supervisor`).

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    error::{DiscordError, DiscordResult},
    events::{GatewayEvent, decode_dispatch},
};

/// Public gateway endpoint, API version 10 with JSON encoding.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const INTENT_GUILDS: u64 = 1 << 0;
const INTENT_GUILD_MESSAGE_POLLS: u64 = 1 << 24;
/// Intents requested at identify time.
pub const INTENTS: u64 = INTENT_GUILDS | INTENT_GUILD_MESSAGE_POLLS;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Connection parameters for gateway sessions.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    token: Arc<str>,
    url: Arc<str>,
}

impl GatewaySession {
    /// Session against the public gateway.
    pub fn new(bot_token: &str) -> Self {
        Self::with_url(DEFAULT_GATEWAY_URL, bot_token)
    }

    /// Session against an arbitrary gateway URL.
    pub fn with_url(url: &str, bot_token: &str) -> Self {
        Self {
            token: Arc::from(bot_token),
            url: Arc::from(url),
        }
    }

    /// Drive one connection until it ends, forwarding decoded events to `events`.
    ///
    /// Returns `Ok(())` only when `cancel` fires; every other exit is an error
    /// the caller is expected to back off from.
    pub async fn run(
        &self,
        events: &mpsc::Sender<GatewayEvent>,
        cancel: &CancellationToken,
    ) -> DiscordResult<()> {
        let connect = tokio::time::timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(self.url.as_ref()),
        );
        let (stream, _) = tokio::select! {
            _ = cancel.cancelled() => {
                info!("gateway connection abandoned on shutdown");
                return Ok(());
            }
            connected = connect => connected
                .map_err(|_| DiscordError::Protocol("timed out connecting to the gateway".into()))??,
        };
        let (mut write, mut read) = stream.split();

        let hello = tokio::time::timeout(HELLO_TIMEOUT, read.next())
            .await
            .map_err(|_| DiscordError::Protocol("timed out waiting for hello".into()))?
            .ok_or_else(|| DiscordError::SessionEnded("closed before hello".into()))??;
        let heartbeat_interval = parse_hello(&hello)?;
        debug!(interval_ms = heartbeat_interval.as_millis() as u64, "gateway hello received");

        write
            .send(Message::Text(identify_payload(&self.token).to_string()))
            .await?;

        // First beat is jittered so reconnecting clients do not beat in lockstep.
        let jitter = rand::rng().random_range(0..heartbeat_interval.as_millis().max(1) as u64);
        let mut heartbeat = interval_at(
            Instant::now() + Duration::from_millis(jitter),
            heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sequence: Option<u64> = None;
        let mut awaiting_ack = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    info!("gateway session closed on shutdown");
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    if awaiting_ack {
                        return Err(DiscordError::SessionEnded("heartbeat not acknowledged".into()));
                    }
                    write.send(heartbeat_payload(sequence)).await?;
                    awaiting_ack = true;
                }
                incoming = read.next() => {
                    let raw = match incoming {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|frame| format!("closed by gateway ({}: {})", frame.code, frame.reason))
                                .unwrap_or_else(|| "closed by gateway".into());
                            return Err(DiscordError::SessionEnded(reason));
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return Err(err.into()),
                        None => return Err(DiscordError::SessionEnded("stream ended".into())),
                    };

                    let frame: GatewayFrame = match serde_json::from_str(&raw) {
                        Ok(frame) => frame,
                        Err(err) => {
                            warn!(error = %err, "discarding undecodable gateway frame");
                            continue;
                        }
                    };

                    match frame.op {
                        OP_DISPATCH => {
                            if frame.s.is_some() {
                                sequence = frame.s;
                            }
                            let Some(name) = frame.t else { continue };
                            match decode_dispatch(&name, frame.d) {
                                Ok(Some(event)) => {
                                    if events.send(event).await.is_err() {
                                        return Err(DiscordError::SessionEnded("event consumer dropped".into()));
                                    }
                                }
                                Ok(None) => {}
                                Err(err) => warn!(event = %name, error = %err, "failed to decode dispatch"),
                            }
                        }
                        OP_HEARTBEAT => {
                            write.send(heartbeat_payload(sequence)).await?;
                        }
                        OP_HEARTBEAT_ACK => awaiting_ack = false,
                        OP_RECONNECT => {
                            return Err(DiscordError::SessionEnded("reconnect requested".into()));
                        }
                        OP_INVALID_SESSION => {
                            return Err(DiscordError::SessionEnded("invalid session".into()));
                        }
                        other => debug!(op = other, "ignoring gateway opcode"),
                    }
                }
            }
        }
    }
}

fn parse_hello(message: &Message) -> DiscordResult<Duration> {
    let Message::Text(text) = message else {
        return Err(DiscordError::Protocol("hello was not a text frame".into()));
    };
    let frame: GatewayFrame = serde_json::from_str(text)
        .map_err(|err| DiscordError::Protocol(format!("undecodable hello: {err}")))?;
    if frame.op != OP_HELLO {
        return Err(DiscordError::Protocol(format!(
            "expected hello, got opcode {}",
            frame.op
        )));
    }
    frame
        .d
        .get("heartbeat_interval")
        .and_then(Value::as_u64)
        .map(Duration::from_millis)
        .ok_or_else(|| DiscordError::Protocol("hello without heartbeat interval".into()))
}

fn identify_payload(token: &str) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "soiree-poll",
                "device": "soiree-poll"
            }
        }
    })
}

fn heartbeat_payload(sequence: Option<u64>) -> Message {
    Message::Text(json!({ "op": OP_HEARTBEAT, "d": sequence }).to_string())
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use tokio::{
        net::{TcpListener, TcpStream},
        sync::oneshot,
        task::JoinHandle,
    };
    use tokio_tungstenite::WebSocketStream;

    use super::*;
    use crate::discord::events::VoteEvent;

    const DEADLINE: Duration = Duration::from_secs(5);

    type ServerSocket = WebSocketStream<TcpStream>;

    /// Accept one websocket client on a local port and hand it to `script`.
    async fn gateway_server<F, Fut>(script: F) -> (String, JoinHandle<()>)
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let socket = tokio_tungstenite::accept_async(tcp).await.unwrap();
            script(socket).await;
        });
        (url, handle)
    }

    fn start_session(
        url: &str,
    ) -> (
        mpsc::Receiver<GatewayEvent>,
        CancellationToken,
        JoinHandle<DiscordResult<()>>,
    ) {
        let session = GatewaySession::with_url(url, "secret");
        let (events_tx, events_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { session.run(&events_tx, &token).await });
        (events_rx, cancel, handle)
    }

    async fn finished(handle: JoinHandle<DiscordResult<()>>) -> DiscordResult<()> {
        tokio::time::timeout(DEADLINE, handle)
            .await
            .expect("session should end")
            .unwrap()
    }

    async fn send_json(socket: &mut ServerSocket, value: Value) {
        socket.send(Message::Text(value.to_string())).await.unwrap();
    }

    async fn next_json(socket: &mut ServerSocket) -> Option<Value> {
        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                return Some(serde_json::from_str(&text).unwrap());
            }
        }
        None
    }

    /// Send hello and check the identify that must follow it.
    async fn handshake(socket: &mut ServerSocket, heartbeat_ms: u64) {
        send_json(socket, json!({"op": 10, "d": {"heartbeat_interval": heartbeat_ms}})).await;
        let identify = next_json(socket).await.unwrap();
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "secret");
    }

    async fn drain(socket: &mut ServerSocket) {
        while let Some(Ok(_)) = socket.next().await {}
    }

    #[tokio::test]
    async fn session_forwards_dispatches_and_beats_with_last_sequence() {
        let (seen_tx, seen_rx) = oneshot::channel();
        let (url, server) = gateway_server(move |mut socket| async move {
            handshake(&mut socket, 50).await;
            send_json(
                &mut socket,
                json!({
                    "op": 0,
                    "s": 5,
                    "t": "MESSAGE_POLL_VOTE_ADD",
                    "d": {"user_id": "42", "channel_id": "7", "message_id": "99", "answer_id": 2}
                }),
            )
            .await;
            loop {
                let frame = next_json(&mut socket).await.unwrap();
                if frame["op"] != 1 {
                    continue;
                }
                send_json(&mut socket, json!({"op": 11})).await;
                if frame["d"] == 5 {
                    break;
                }
            }
            seen_tx.send(()).unwrap();
            drain(&mut socket).await;
        })
        .await;

        let (mut events, cancel, session) = start_session(&url);
        let event = tokio::time::timeout(DEADLINE, events.recv()).await.unwrap();
        assert_eq!(
            event,
            Some(GatewayEvent::PollVoteAdd(VoteEvent {
                user_id: 42,
                channel_id: 7,
                message_id: 99,
                answer_id: 2,
            }))
        );

        tokio::time::timeout(DEADLINE, seen_rx).await.unwrap().unwrap();
        cancel.cancel();
        assert!(finished(session).await.is_ok());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn reconnect_and_invalid_session_end_the_session() {
        for (op, expected) in [(7, "reconnect requested"), (9, "invalid session")] {
            let (url, server) = gateway_server(move |mut socket| async move {
                handshake(&mut socket, 60_000).await;
                send_json(&mut socket, json!({"op": op, "d": false})).await;
                drain(&mut socket).await;
            })
            .await;

            let (_events, _cancel, session) = start_session(&url);
            match finished(session).await {
                Err(DiscordError::SessionEnded(reason)) => assert_eq!(reason, expected),
                other => panic!("op {op}: unexpected session result {other:?}"),
            }
            server.await.unwrap();
        }
    }

    #[tokio::test]
    async fn unacknowledged_heartbeat_ends_the_session() {
        let (url, server) = gateway_server(|mut socket| async move {
            handshake(&mut socket, 30).await;
            // Heartbeats are read but never acknowledged.
            drain(&mut socket).await;
        })
        .await;

        let (_events, _cancel, session) = start_session(&url);
        assert!(matches!(
            finished(session).await,
            Err(DiscordError::SessionEnded(reason)) if reason == "heartbeat not acknowledged"
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_frame_ends_the_session() {
        let (url, server) = gateway_server(|mut socket| async move {
            handshake(&mut socket, 60_000).await;
            socket.send(Message::Close(None)).await.unwrap();
            drain(&mut socket).await;
        })
        .await;

        let (_events, _cancel, session) = start_session(&url);
        assert!(matches!(
            finished(session).await,
            Err(DiscordError::SessionEnded(reason)) if reason.starts_with("closed by gateway")
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_interrupts_a_stalled_connect() {
        // Accepts TCP connections but never answers the websocket handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let (_events, cancel, session) = start_session(&url);
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        assert!(finished(session).await.is_ok());
        drop(listener);
    }

    #[test]
    fn hello_yields_heartbeat_interval() {
        let hello = Message::Text(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#.into());
        assert_eq!(parse_hello(&hello).unwrap(), Duration::from_millis(41_250));
    }

    #[test]
    fn non_hello_first_frame_is_a_protocol_error() {
        let frame = Message::Text(r#"{"op":11}"#.into());
        assert!(matches!(parse_hello(&frame), Err(DiscordError::Protocol(_))));
    }

    #[test]
    fn identify_requests_poll_intents() {
        let payload = identify_payload("secret");
        assert_eq!(payload["op"], 2);
        assert_eq!(payload["d"]["token"], "secret");
        assert_eq!(payload["d"]["intents"], 16_777_217);
    }

    #[test]
    fn heartbeat_carries_last_sequence() {
        let Message::Text(text) = heartbeat_payload(Some(42)) else {
            panic!("heartbeat must be a text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"op": 1, "d": 42}));

        let Message::Text(text) = heartbeat_payload(None) else {
            panic!("heartbeat must be a text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"op": 1, "d": null}));
    }
}
