//! SSE-backed credential receiver.
//!
//! One long-lived subscription to the consumer backend's pull stream per
//! workflow run. Inbound `data:` lines carrying a `transfer_process_id` are
//! buffered in a shared map; the waiter polls that map until its deadline.

use dashmap::DashMap;
use futures::StreamExt;
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use broker_shared::models::CredentialEntry;
use broker_shared::{BrokerError, BrokerResult};

/// Default cadence at which the waiter re-checks the credential store
pub(crate) const DEFAULT_POLL_TICK: Duration = Duration::from_secs(1);

/// Credential receiver backed by a long-lived SSE subscription
#[derive(Debug)]
pub struct StreamingCredentialReceiver {
    http: Client,
    stream_url: String,
    api_key: String,
    store: Arc<DashMap<String, CredentialEntry>>,
    poll_tick: Duration,
    subscription: Option<JoinHandle<()>>,
}

impl StreamingCredentialReceiver {
    /// Build a receiver for one provider host's event stream.
    ///
    /// `consumer_backend_url` is the backend exposing the pull stream;
    /// `provider_host` scopes the subscription to one counterparty.
    pub fn new(
        http: Client,
        consumer_backend_url: &str,
        api_key: impl Into<String>,
        provider_host: &str,
    ) -> Self {
        Self {
            http,
            stream_url: format!(
                "{}/pull/stream/provider/{}",
                consumer_backend_url.trim_end_matches('/'),
                provider_host
            ),
            api_key: api_key.into(),
            store: Arc::new(DashMap::new()),
            poll_tick: DEFAULT_POLL_TICK,
            subscription: None,
        }
    }

    /// Override the waiter's re-check cadence (tests use millisecond ticks)
    pub fn with_poll_tick(mut self, poll_tick: Duration) -> Self {
        self.poll_tick = poll_tick;
        self
    }

    /// Open the subscription in a background task.
    ///
    /// The task runs independently of any waiter; stream failures are logged
    /// and surface to the caller as a credential timeout.
    pub fn start(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let http = self.http.clone();
        let url = self.stream_url.clone();
        let api_key = self.api_key.clone();
        let store = Arc::clone(&self.store);
        self.subscription = Some(tokio::spawn(async move {
            listen(http, url, api_key, store).await;
        }));
    }

    /// Wait for the credential keyed by `transfer_id`.
    ///
    /// Polls the in-memory store at the configured tick until `timeout`
    /// elapses. Retrieval is non-destructive; repeated calls for the same
    /// key return the same stored payload.
    pub async fn get_credential(
        &self,
        transfer_id: &str,
        timeout: Duration,
    ) -> BrokerResult<CredentialEntry> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(entry) = self.store.get(transfer_id) {
                return Ok(entry.clone());
            }
            if Instant::now() >= deadline {
                return Err(BrokerError::CredentialTimeout {
                    transfer_id: transfer_id.to_string(),
                    timeout_seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_tick).await;
        }
    }

    /// Cancel the subscription and await its termination.
    ///
    /// Cancellation is the normal shutdown path, not an error; the HTTP
    /// connection and buffers are released here regardless of whether a
    /// credential was ever received.
    pub async fn stop(&mut self) {
        if let Some(task) = self.subscription.take() {
            task.abort();
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    debug!("Credential subscription cancelled on shutdown");
                }
                Err(e) => {
                    error!(error = %e, "Credential subscription task panicked");
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Arc<DashMap<String, CredentialEntry>> {
        &self.store
    }
}

/// Consume the SSE stream, buffering credentials keyed by transfer id
async fn listen(
    http: Client,
    url: String,
    api_key: String,
    store: Arc<DashMap<String, CredentialEntry>>,
) {
    let response = match http
        .get(&url)
        .bearer_auth(&api_key)
        .header(header::ACCEPT, "text/event-stream")
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        Ok(response) => response,
        Err(e) => {
            error!(url = %url, error = %e, "Credential stream connection failed");
            return;
        }
    };

    info!(url = %url, "Credential stream connected");

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                buffer.extend_from_slice(&bytes);
                drain_complete_lines(&mut buffer, &store);
            }
            Err(e) => {
                error!(url = %url, error = %e, "Credential stream read failed");
                break;
            }
        }
    }

    debug!(url = %url, "Credential stream closed");
}

/// Split off complete lines from the byte buffer and process each.
///
/// Partial trailing bytes stay buffered, so a line (or a multi-byte UTF-8
/// character inside one) split across stream chunks is reassembled before
/// decoding.
pub(crate) fn drain_complete_lines(buffer: &mut Vec<u8>, store: &DashMap<String, CredentialEntry>) {
    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
        let line_bytes: Vec<u8> = buffer.drain(..=newline).collect();
        let line = String::from_utf8_lossy(&line_bytes[..newline]);
        process_sse_line(line.trim_end_matches('\r'), store);
    }
}

/// Parse one SSE line; only `data:` payloads with a transfer id are kept.
///
/// Last write wins when the same transfer id recurs.
pub(crate) fn process_sse_line(line: &str, store: &DashMap<String, CredentialEntry>) {
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return;
    };
    let Ok(payload) = serde_json::from_str(data) else {
        // Non-JSON data lines (keep-alives, comments) are ignored
        return;
    };
    let entry = CredentialEntry::new(payload);
    if let Some(transfer_id) = entry.transfer_process_id() {
        info!(transfer_id = %transfer_id, "Received credentials for transfer");
        store.insert(transfer_id.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_process_sse_line_stores_by_transfer_id() {
        let store = DashMap::new();
        process_sse_line(
            r#"data: {"transfer_process_id": "tr-1", "authKey": "tok-1"}"#,
            &store,
        );

        let entry = store.get("tr-1").expect("credential should be stored");
        assert_eq!(entry.access_token(), Some("tok-1"));
    }

    #[test]
    fn test_process_sse_line_last_write_wins() {
        let store = DashMap::new();
        process_sse_line(
            r#"data: {"transfer_process_id": "tr-1", "authKey": "old"}"#,
            &store,
        );
        process_sse_line(
            r#"data: {"transfer_process_id": "tr-1", "authKey": "new"}"#,
            &store,
        );

        assert_eq!(store.get("tr-1").unwrap().access_token(), Some("new"));
    }

    #[test]
    fn test_process_sse_line_ignores_non_data_lines() {
        let store = DashMap::new();
        process_sse_line("event: ping", &store);
        process_sse_line(": keep-alive", &store);
        process_sse_line("", &store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_process_sse_line_ignores_invalid_json() {
        let store = DashMap::new();
        process_sse_line("data: not json", &store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_process_sse_line_ignores_messages_without_transfer_id() {
        let store = DashMap::new();
        process_sse_line(r#"data: {"authKey": "tok-1"}"#, &store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_partial_line_stays_buffered_until_newline_arrives() {
        let store = DashMap::new();
        let line = "data: {\"transfer_process_id\": \"tr-1\", \"authKey\": \"tok-1\"}\r\n";
        let bytes = line.as_bytes();

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&bytes[..20]);
        drain_complete_lines(&mut buffer, &store);
        assert!(store.is_empty());

        buffer.extend_from_slice(&bytes[20..]);
        drain_complete_lines(&mut buffer, &store);
        assert_eq!(store.get("tr-1").unwrap().access_token(), Some("tok-1"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multibyte_char_split_across_chunks_is_reassembled() {
        let store = DashMap::new();
        let line = "data: {\"transfer_process_id\": \"tr-münchen\", \"authKey\": \"tok-1\"}\n";
        let bytes = line.as_bytes();
        // Chunk boundary inside the two-byte encoding of 'ü'
        let split = line.find('ü').unwrap() + 1;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&bytes[..split]);
        drain_complete_lines(&mut buffer, &store);
        assert!(store.is_empty());

        buffer.extend_from_slice(&bytes[split..]);
        drain_complete_lines(&mut buffer, &store);
        assert_eq!(store.get("tr-münchen").unwrap().access_token(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_get_credential_returns_buffered_entry() {
        let receiver = StreamingCredentialReceiver::new(
            Client::new(),
            "http://backend:28000",
            "key",
            "provider:19194",
        )
        .with_poll_tick(Duration::from_millis(5));

        receiver.store().insert(
            "tr-1".to_string(),
            CredentialEntry::new(json!({"transfer_process_id": "tr-1", "authKey": "tok-1"})),
        );

        let entry = receiver
            .get_credential("tr-1", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(entry.access_token(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_get_credential_is_non_destructive() {
        let receiver = StreamingCredentialReceiver::new(
            Client::new(),
            "http://backend:28000",
            "key",
            "provider:19194",
        )
        .with_poll_tick(Duration::from_millis(5));

        receiver.store().insert(
            "tr-1".to_string(),
            CredentialEntry::new(json!({"transfer_process_id": "tr-1", "token": "tok"})),
        );

        let first = receiver
            .get_credential("tr-1", Duration::from_millis(100))
            .await
            .unwrap();
        let second = receiver
            .get_credential("tr-1", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(first.payload, second.payload);
    }

    #[tokio::test]
    async fn test_get_credential_times_out_when_key_never_appears() {
        let receiver = StreamingCredentialReceiver::new(
            Client::new(),
            "http://backend:28000",
            "key",
            "provider:19194",
        )
        .with_poll_tick(Duration::from_millis(5));

        let err = receiver
            .get_credential("tr-missing", Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::CredentialTimeout { .. }));
    }

    #[tokio::test]
    async fn test_get_credential_unblocks_when_entry_arrives_late() {
        let receiver = StreamingCredentialReceiver::new(
            Client::new(),
            "http://backend:28000",
            "key",
            "provider:19194",
        )
        .with_poll_tick(Duration::from_millis(5));

        let store = Arc::clone(receiver.store());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.insert(
                "tr-late".to_string(),
                CredentialEntry::new(json!({"transfer_process_id": "tr-late", "authKey": "t"})),
            );
        });

        let entry = receiver
            .get_credential("tr-late", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(entry.access_token(), Some("t"));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_a_noop() {
        let mut receiver = StreamingCredentialReceiver::new(
            Client::new(),
            "http://backend:28000",
            "key",
            "provider:19194",
        );
        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_stop_cancels_and_awaits_subscription() {
        let mut receiver = StreamingCredentialReceiver::new(
            Client::new(),
            // Unroutable; the subscription task will sit in connect until aborted
            "http://192.0.2.1:1",
            "key",
            "provider:19194",
        );
        receiver.start();
        receiver.stop().await;
        assert!(receiver.subscription.is_none());
    }
}
