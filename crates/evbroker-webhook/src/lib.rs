//! Blocking HTTP delivery for `DeliveryBinding::Http` consumers.
//!
//! The dispatcher (C5) calls [`WebhookClient::deliver`] directly on its own
//! thread — delivery blocks for up to the client's timeout, matching the
//! design decision to keep one thread per topic rather than pool HTTP work
//! across a separate executor.

use std::time::Duration;

use anyhow::Context;
use evbroker_types::Event;
use serde::Serialize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound payload delivered to a webhook consumer: `{consumerId, events}`.
#[derive(Debug, Serialize)]
struct WebhookDeliveryPayload<'a> {
    consumer_id: String,
    events: &'a [Event],
}

/// A reusable client for POSTing event batches to consumer webhook URLs.
pub struct WebhookClient {
    client: reqwest::blocking::Client,
}

impl WebhookClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self { client })
    }

    /// Deliver a batch of events to `url`. A 2xx response is success;
    /// anything else — including a transport failure — is a failure the
    /// dispatcher should retry.
    pub fn deliver(&self, url: &str, consumer_id: &str, events: &[Event]) -> Result<(), String> {
        self.do_deliver(url, None, consumer_id, events)
    }

    /// Deliver a batch of events to `url`, carrying an additional header
    /// (`header_name: header_value`) — used for Azure Event Grid's
    /// `aeg-sas-key` custom-topic authentication.
    pub fn deliver_with_header(
        &self,
        url: &str,
        header_name: &str,
        header_value: &str,
        consumer_id: &str,
        events: &[Event],
    ) -> Result<(), String> {
        self.do_deliver(url, Some((header_name, header_value)), consumer_id, events)
    }

    fn do_deliver(
        &self,
        url: &str,
        extra_header: Option<(&str, &str)>,
        consumer_id: &str,
        events: &[Event],
    ) -> Result<(), String> {
        let payload = WebhookDeliveryPayload {
            consumer_id: consumer_id.to_string(),
            events,
        };

        let body = serde_json::to_string(&payload).map_err(|e| e.to_string())?;

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some((name, value)) = extra_header {
            request = request.header(name, value);
        }

        let response = request
            .body(body)
            .send()
            .map_err(|e| format!("webhook request failed: {e}"))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            Err(format!("webhook returned {status}: {body}"))
        }
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new().expect("default webhook client config is always valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use evbroker_types::EventId;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn spawn_status_server(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        thread::spawn(move || {
            for stream in listener.incoming().take(5) {
                let mut stream = stream.expect("stream");
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                counter_clone.fetch_add(1, Ordering::SeqCst);
                let _ = stream.write_all(status_line.as_bytes());
                let _ = stream.flush();
            }
        });

        (format!("http://{}", addr), counter)
    }

    fn sample_events() -> Vec<Event> {
        vec![Event {
            id: EventId::canonical("orders", 1),
            sequence: 1,
            event_type: "order.created".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({"orderId": "abc"}),
        }]
    }

    #[test]
    fn success_status_is_reported_as_delivered() {
        let (url, counter) = spawn_status_server("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK");
        let client = WebhookClient::with_timeout(Duration::from_secs(5)).unwrap();

        let result = client.deliver(&url, "consumer-1", &sample_events());
        assert!(result.is_ok());
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn non_2xx_status_is_reported_as_failure() {
        let (url, _counter) =
            spawn_status_server("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 2\r\n\r\nNO");
        let client = WebhookClient::with_timeout(Duration::from_secs(5)).unwrap();

        let result = client.deliver(&url, "consumer-1", &sample_events());
        assert!(result.is_err());
    }

    #[test]
    fn unreachable_url_is_reported_as_failure() {
        let client = WebhookClient::with_timeout(Duration::from_millis(200)).unwrap();
        let result = client.deliver("http://127.0.0.1:1", "consumer-1", &sample_events());
        assert!(result.is_err());
    }
}
