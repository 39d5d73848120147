//! Bridge channel client
//!
//! One fresh WebSocket connection is opened per logical device operation and
//! closed by whichever side observes completion or error; messages within a
//! connection are correlated purely by the `order` counter, so two
//! operations must never interleave on one channel. An async mutex
//! serializes operations issued through the same client instance.
//!
//! Connection failure (the bridge service is not running) and device failure
//! (a non-zero `LastError` at some step) are distinct conditions: the former
//! is fatal and user-visible, the latter is a recoverable per-operation
//! outcome.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::protocol::{reset_order, Command, ProcessFrame, BRIDGE_SUBPROTOCOL};

/// Default deadline for a whole operation, connect included. The bridge
/// protocol has no liveness guarantee of its own.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The channel could not be opened: the bridge service is unreachable.
    /// Surfaced to users as "service unavailable", not as a failed attempt.
    #[error("USB key bridge service is unavailable")]
    Unavailable,

    /// The device reported a non-zero error code at some step
    #[error("USB key operation failed with device error {0}")]
    Device(i32),

    /// No terminal frame arrived before the deadline
    #[error("USB key operation timed out")]
    Timeout,

    /// The bridge sent something outside the wire contract
    #[error("USB key bridge protocol error: {0}")]
    Protocol(String),
}

/// The outcome of a multi-step exchange.
///
/// `results` holds the `return_value` of every step that completed before
/// the first failure; `error_code` is zero when all steps succeeded. Callers
/// that need all-or-nothing semantics use [`BridgeClient::invoke`] instead.
#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    pub results: Vec<Value>,
    pub error_code: i32,
}

impl SequenceOutcome {
    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }
}

/// Client for the local USB key bridge service
pub struct BridgeClient {
    url: String,
    operation_timeout: Duration,
    // One in-flight operation at a time; the bridge correlates frames by
    // sequence number within a channel, not by operation identity.
    op_lock: Mutex<()>,
}

impl BridgeClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            op_lock: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    /// Run a single-command operation and return its result.
    ///
    /// A non-zero device error code is returned as [`BridgeError::Device`].
    pub async fn invoke(&self, command: Command) -> Result<Value, BridgeError> {
        let mut outcome = self.invoke_sequence(vec![command]).await?;
        if outcome.error_code != 0 {
            return Err(BridgeError::Device(outcome.error_code));
        }
        Ok(outcome.results.pop().unwrap_or(Value::Null))
    }

    /// Run an ordered multi-command exchange on one channel.
    ///
    /// Step `k` is sent when the frame with `order == k` arrives; the frame
    /// with `order == k + 1` carries step `k`'s result. A device error stops
    /// the exchange but is reported in the outcome rather than as an `Err`,
    /// so callers can observe partial results (key pair generation relies on
    /// this).
    pub async fn invoke_sequence(
        &self,
        steps: Vec<Command>,
    ) -> Result<SequenceOutcome, BridgeError> {
        let _guard = self.op_lock.lock().await;

        let result = timeout(self.operation_timeout, self.run_exchange(&steps)).await;
        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::Timeout),
        }
    }

    async fn run_exchange(&self, steps: &[Command]) -> Result<SequenceOutcome, BridgeError> {
        let mut stream = self.connect().await?;

        // Reset the server-side sequence counter; the reply is the order-0
        // frame that starts the exchange.
        if let Err(err) = send_command(&mut stream, &reset_order()).await {
            let _ = stream.close(None).await;
            return Err(err);
        }

        let mut results = Vec::with_capacity(steps.len());
        let mut error_code = 0;

        let outcome = loop {
            let frame = match next_process_frame(&mut stream).await {
                Ok(frame) => frame,
                Err(err) => break Err(err),
            };

            let order = frame.order as usize;

            // Results ride on frames with order >= 1; check the device error
            // before recording or continuing.
            if order > 0 {
                if frame.last_error != 0 {
                    error_code = frame.last_error;
                    break Ok(SequenceOutcome {
                        results,
                        error_code,
                    });
                }
                results.push(frame.return_value);
            }

            if order < steps.len() {
                if let Err(err) = send_command(&mut stream, &steps[order]).await {
                    break Err(err);
                }
            } else if order == steps.len() {
                break Ok(SequenceOutcome {
                    results,
                    error_code,
                });
            } else {
                break Err(BridgeError::Protocol(format!(
                    "unexpected order {order} for a {}-step exchange",
                    steps.len()
                )));
            }
        };

        // The observing side closes the channel exactly once
        let _ = stream.close(None).await;
        outcome
    }

    async fn connect(&self) -> Result<WsStream, BridgeError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Protocol(format!("invalid bridge URL: {e}")))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(BRIDGE_SUBPROTOCOL),
        );

        match connect_async(request).await {
            Ok((stream, _response)) => Ok(stream),
            Err(err) => {
                tracing::warn!(url = %self.url, error = %err, "bridge connection failed");
                Err(BridgeError::Unavailable)
            }
        }
    }
}

async fn send_command(stream: &mut WsStream, command: &Command) -> Result<(), BridgeError> {
    let text = serde_json::to_string(command)
        .map_err(|e| BridgeError::Protocol(format!("frame encoding failed: {e}")))?;
    stream
        .send(Message::Text(text))
        .await
        .map_err(|e| BridgeError::Protocol(format!("frame send failed: {e}")))
}

/// Read frames until the next `Process` frame; anything else is skipped
async fn next_process_frame(stream: &mut WsStream) -> Result<ProcessFrame, BridgeError> {
    loop {
        let message = match stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                return Err(BridgeError::Protocol(format!("frame receive failed: {err}")))
            }
            None => {
                return Err(BridgeError::Protocol(
                    "channel closed before the exchange completed".to_string(),
                ))
            }
        };

        match message {
            Message::Text(text) => {
                let frame: ProcessFrame = serde_json::from_str(&text)
                    .map_err(|e| BridgeError::Protocol(format!("malformed frame: {e}")))?;
                if frame.is_process() {
                    return Ok(frame);
                }
            }
            Message::Close(_) => {
                return Err(BridgeError::Protocol(
                    "channel closed before the exchange completed".to_string(),
                ))
            }
            // Control frames are handled by the transport
            _ => {}
        }
    }
}
