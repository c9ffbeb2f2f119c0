use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

use aibridge_core::{Error, Result};

use crate::pattern::ChannelPattern;

/// Buffered messages per local subscription before drops kick in.
const SUBSCRIPTION_BUFFER: usize = 64;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Wire frames spoken with the broker.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Frame {
    Publish { channel: String, payload: Value },
    Subscribe { pattern: String },
    Message { channel: String, payload: Value },
}

/// The broadcast envelope wrapped around every published payload. The `id`
/// lets subscribers deduplicate on `(channel, id)` if they need stronger
/// than at-most-once semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub from: String,
    pub payload: Value,
    pub sent_at: DateTime<Utc>,
}

/// A message delivered to a local subscription.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub channel: String,
    pub envelope: Envelope,
}

struct Subscription {
    pattern: ChannelPattern,
    tx: mpsc::Sender<BusMessage>,
}

type SubscriptionList = Arc<Mutex<Vec<Subscription>>>;

/// Publish/subscribe client for the cross-assistant broker.
///
/// Publishing is fire-and-forget: no delivery guarantee, no ack. Inbound
/// messages are fanned out by a single reader task, so delivery order is
/// preserved per channel (never across channels).
pub struct Coordinator {
    assistant: String,
    sink: Arc<Mutex<WsSink>>,
    subscriptions: SubscriptionList,
}

impl Coordinator {
    /// Connect to the broker and start the reader task. Connection failure
    /// here is fatal to the adapter bootstrap; the supervisor handles the
    /// resulting exit.
    pub async fn connect(broker_url: &str, assistant: &str) -> Result<Self> {
        let (stream, _) = connect_async(broker_url)
            .await
            .map_err(|e| Error::Bus(format!("broker connect failed ({broker_url}): {e}")))?;
        debug!(broker = broker_url, assistant, "Connected to broker");

        let (sink, source) = stream.split();
        let subscriptions: SubscriptionList = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(Self::reader_task(
            source,
            subscriptions.clone(),
            assistant.to_string(),
        ));

        Ok(Self {
            assistant: assistant.to_string(),
            sink: Arc::new(Mutex::new(sink)),
            subscriptions,
        })
    }

    pub fn assistant(&self) -> &str {
        &self.assistant
    }

    /// Fire-and-forget broadcast. Send failures are logged and swallowed;
    /// the broker offers no acknowledgement either way.
    pub async fn publish(&self, channel: &str, payload: Value) {
        let envelope = Envelope {
            id: uuid::Uuid::new_v4().to_string(),
            from: self.assistant.clone(),
            payload,
            sent_at: Utc::now(),
        };
        let frame = Frame::Publish {
            channel: channel.to_string(),
            payload: match serde_json::to_value(&envelope) {
                Ok(v) => v,
                Err(e) => {
                    error!(channel, error = %e, "Failed to serialize envelope");
                    return;
                }
            },
        };
        let line = match serde_json::to_string(&frame) {
            Ok(l) => l,
            Err(e) => {
                error!(channel, error = %e, "Failed to serialize frame");
                return;
            }
        };

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(WsMessage::Text(line)).await {
            warn!(channel, error = %e, "Publish dropped: broker send failed");
        }
    }

    /// Register a pattern with the broker and return the receiving end of
    /// the local subscription. Messages arrive in per-channel order.
    pub async fn subscribe(&self, pattern: &str) -> Result<mpsc::Receiver<BusMessage>> {
        let parsed = ChannelPattern::parse(pattern);
        let frame = Frame::Subscribe {
            pattern: parsed.to_string(),
        };
        let line = serde_json::to_string(&frame)?;
        {
            let mut sink = self.sink.lock().await;
            sink.send(WsMessage::Text(line))
                .await
                .map_err(|e| Error::Bus(format!("subscribe({pattern}) failed: {e}")))?;
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscriptions.lock().await.push(Subscription {
            pattern: parsed,
            tx,
        });
        debug!(pattern, "Subscribed");
        Ok(rx)
    }

    /// Single reader: fans every inbound `message` frame out to matching
    /// local subscriptions. A closed receiver drops the subscription; a
    /// full buffer drops the message (at-most-once).
    async fn reader_task(mut source: WsSource, subscriptions: SubscriptionList, assistant: String) {
        while let Some(next) = source.next().await {
            let text = match next {
                Ok(WsMessage::Text(t)) => t,
                Ok(WsMessage::Close(_)) => {
                    warn!(assistant, "Broker closed the connection");
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!(assistant, error = %e, "Broker read error");
                    break;
                }
            };

            let frame = match serde_json::from_str::<Frame>(&text) {
                Ok(f) => f,
                Err(e) => {
                    warn!(assistant, error = %e, "Ignoring malformed broker frame");
                    continue;
                }
            };

            let (channel, payload) = match frame {
                Frame::Message { channel, payload } => (channel, payload),
                // The broker should never echo publish/subscribe back.
                _ => continue,
            };

            let envelope = match serde_json::from_value::<Envelope>(payload) {
                Ok(env) => env,
                Err(e) => {
                    warn!(assistant, channel, error = %e, "Ignoring malformed envelope");
                    continue;
                }
            };

            let mut subs = subscriptions.lock().await;
            subs.retain(|s| !s.tx.is_closed());
            for sub in subs.iter() {
                if !sub.pattern.matches(&channel) {
                    continue;
                }
                let msg = BusMessage {
                    channel: channel.clone(),
                    envelope: envelope.clone(),
                };
                if sub.tx.try_send(msg).is_err() {
                    warn!(channel, "Subscriber buffer full, message dropped");
                }
            }
        }

        // Reader gone: wake every subscriber by dropping the senders.
        subscriptions.lock().await.clear();
    }
}
