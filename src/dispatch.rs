use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::alerts::Alerts;
use crate::client::{ClusterResponse, Transport};
use crate::history::RequestHistory;
use crate::request::Request;
use crate::storage::KeyValueStore;

const GET_METHOD: &str = "GET";
const EMPTY_BODY: &str = "{}";

/// Likely operator mistakes spotted before a request goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    EmptyPath,
    GetWithBody,
}

impl Warning {
    pub fn message(self) -> &'static str {
        match self {
            Warning::EmptyPath => "Path is empty",
            Warning::GetWithBody => {
                "You are executing a GET request with body content. Maybe you meant to use POST or PUT?"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    pub proceed: bool,
    pub warning: Option<Warning>,
}

pub fn validate(request: &Request) -> Validation {
    if request.path().is_empty() {
        return Validation {
            proceed: false,
            warning: Some(Warning::EmptyPath),
        };
    }

    let warning = (request.method() == GET_METHOD && has_content(request.body()))
        .then_some(Warning::GetWithBody);
    Validation {
        proceed: true,
        warning,
    }
}

/// Anything but blank text or an empty object counts as content.
fn has_content(body: &str) -> bool {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    !compact.is_empty() && compact != EMPTY_BODY
}

pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    alerts: Arc<dyn Alerts>,
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>, alerts: Arc<dyn Alerts>) -> Self {
        Self { transport, alerts }
    }

    /// Validates `request` carrying `formatted_body` and, unless blocked,
    /// spawns the transport call and records the request in `history`.
    ///
    /// The history entry is written right away; it is not rolled back if the
    /// call later fails. `on_complete` runs on the spawned task with the
    /// call's outcome.
    pub fn send<S, F>(
        &self,
        request: &Request,
        formatted_body: &str,
        history: &mut RequestHistory<S>,
        on_complete: F,
    ) -> Option<JoinHandle<()>>
    where
        S: KeyValueStore,
        F: FnOnce(Result<ClusterResponse>) + Send + 'static,
    {
        let request = request.with_body(formatted_body);
        let validation = validate(&request);
        if !validation.proceed {
            if let Some(warning) = validation.warning {
                self.alerts.warn(warning.message());
            }
            return None;
        }
        if let Some(warning) = validation.warning {
            self.alerts.info(warning.message());
        }

        let call = self
            .transport
            .cluster_request(request.method(), request.path(), request.body());
        let handle = tokio::spawn(async move { on_complete(call.await) });

        if let Err(err) = history.add(request) {
            self.alerts
                .error(&format!("Failed to save request history: {err}"));
        }
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportFuture;
    use crate::storage::MemoryStore;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    type Call = (String, String, String);

    #[derive(Default)]
    struct FakeTransport {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl Transport for FakeTransport {
        fn cluster_request(&self, method: &str, path: &str, body: &str) -> TransportFuture {
            self.calls
                .lock()
                .expect("calls lock")
                .push((method.to_string(), path.to_string(), body.to_string()));
            let result = if self.fail {
                Err(anyhow!("connection refused"))
            } else {
                Ok(ClusterResponse {
                    status: 200,
                    body: "{}".to_string(),
                })
            };
            Box::pin(std::future::ready(result))
        }
    }

    #[derive(Default)]
    struct RecordingAlerts {
        seen: Mutex<Vec<(&'static str, String)>>,
    }

    impl RecordingAlerts {
        fn record(&self, level: &'static str, message: &str) {
            self.seen
                .lock()
                .expect("alerts lock")
                .push((level, message.to_string()));
        }

        fn seen(&self) -> Vec<(&'static str, String)> {
            self.seen.lock().expect("alerts lock").clone()
        }
    }

    impl Alerts for RecordingAlerts {
        fn success(&self, message: &str) {
            self.record("success", message);
        }
        fn info(&self, message: &str) {
            self.record("info", message);
        }
        fn warn(&self, message: &str) {
            self.record("warn", message);
        }
        fn error(&self, message: &str) {
            self.record("error", message);
        }
    }

    fn dispatcher(fail: bool) -> (RequestDispatcher, Arc<FakeTransport>, Arc<RecordingAlerts>) {
        let transport = Arc::new(FakeTransport {
            fail,
            ..Default::default()
        });
        let alerts = Arc::new(RecordingAlerts::default());
        (
            RequestDispatcher::new(transport.clone(), alerts.clone()),
            transport,
            alerts,
        )
    }

    #[test]
    fn empty_path_blocks() {
        let validation = validate(&Request::new("", "POST", "{'uno':'dos'}"));
        assert_eq!(
            validation,
            Validation {
                proceed: false,
                warning: Some(Warning::EmptyPath)
            }
        );
    }

    #[test]
    fn get_with_body_is_advisory() {
        let validation = validate(&Request::new("/x", "GET", "{'uno':'dos'}"));
        assert_eq!(
            validation,
            Validation {
                proceed: true,
                warning: Some(Warning::GetWithBody)
            }
        );
    }

    #[test]
    fn post_with_body_passes() {
        let validation = validate(&Request::new("/x", "POST", "{'uno':'dos'}"));
        assert_eq!(
            validation,
            Validation {
                proceed: true,
                warning: None
            }
        );
    }

    #[test]
    fn get_with_trivial_body_passes() {
        for body in ["", "{}", "  ", "{\n}"] {
            assert_eq!(validate(&Request::new("/x", "GET", body)).warning, None);
        }
    }

    #[test]
    fn method_check_is_case_sensitive() {
        assert_eq!(
            validate(&Request::new("/x", "get", "{'uno':'dos'}")).warning,
            None
        );
    }

    #[tokio::test]
    async fn sends_valid_request_and_records_it() {
        let (dispatcher, transport, alerts) = dispatcher(false);
        let mut history = RequestHistory::new(MemoryStore::new());
        let request = Request::new("/test_rest/_search", "POST", "raw");
        let (tx, rx) = tokio::sync::oneshot::channel();

        let handle = dispatcher
            .send(&request, "{'uno': 'dos'}", &mut history, move |result| {
                let _ = tx.send(result.map(|r| r.status));
            })
            .expect("dispatched");
        handle.await.expect("join");

        assert_eq!(rx.await.expect("outcome").expect("success"), 200);
        assert_eq!(
            transport.calls.lock().expect("calls").clone(),
            vec![(
                "POST".to_string(),
                "/test_rest/_search".to_string(),
                "{'uno': 'dos'}".to_string()
            )]
        );
        assert!(alerts.seen().is_empty());
        assert_eq!(
            history.list()[0],
            Request::new("/test_rest/_search", "POST", "{'uno': 'dos'}")
        );
    }

    #[tokio::test]
    async fn empty_path_skips_transport_and_history() {
        let (dispatcher, transport, alerts) = dispatcher(false);
        let mut history = RequestHistory::new(MemoryStore::new());

        let handle = dispatcher.send(
            &Request::new("", "POST", "{'uno': 'dos'}"),
            "{'uno': 'dos'}",
            &mut history,
            |_| {},
        );

        assert!(handle.is_none());
        assert!(transport.calls.lock().expect("calls").is_empty());
        assert!(history.is_empty());
        assert!(history.store().writes().is_empty());
        assert_eq!(alerts.seen(), vec![("warn", "Path is empty".to_string())]);
    }

    #[tokio::test]
    async fn get_with_body_warns_and_still_sends() {
        let (dispatcher, transport, alerts) = dispatcher(false);
        let mut history = RequestHistory::new(MemoryStore::new());

        let handle = dispatcher
            .send(
                &Request::new("/test_rest/_search", "GET", ""),
                "{'uno': 'dos'}",
                &mut history,
                |_| {},
            )
            .expect("dispatched");
        handle.await.expect("join");

        assert_eq!(transport.calls.lock().expect("calls").len(), 1);
        assert_eq!(
            alerts.seen(),
            vec![(
                "info",
                "You are executing a GET request with body content. Maybe you meant to use POST or PUT?"
                    .to_string()
            )]
        );
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn failed_history_write_alerts_and_still_sends() {
        let (dispatcher, transport, alerts) = dispatcher(false);
        let mut history = RequestHistory::new(MemoryStore::new().failing_writes());
        let request = Request::new("/test_rest/_search", "POST", "");

        let handle = dispatcher
            .send(&request, "{'uno': 'dos'}", &mut history, |_| {})
            .expect("dispatched");
        handle.await.expect("join");

        assert_eq!(transport.calls.lock().expect("calls").len(), 1);
        assert_eq!(
            history.list()[0],
            Request::new("/test_rest/_search", "POST", "{'uno': 'dos'}")
        );
        let seen = alerts.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "error");
        assert!(seen[0].1.starts_with("Failed to save request history"));
    }

    #[tokio::test]
    async fn history_keeps_request_when_transport_fails() {
        let (dispatcher, _transport, _alerts) = dispatcher(true);
        let mut history = RequestHistory::new(MemoryStore::new());
        let (tx, rx) = tokio::sync::oneshot::channel();

        dispatcher
            .send(&Request::new("/_cat/health", "GET", ""), "", &mut history, move |result| {
                let _ = tx.send(result.is_err());
            })
            .expect("dispatched");

        assert!(rx.await.expect("outcome"));
        assert_eq!(history.list()[0], Request::new("/_cat/health", "GET", ""));
    }
}
