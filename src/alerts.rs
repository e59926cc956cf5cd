use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const MAX_FEED_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Success,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

/// Operator-facing notifications. Delivery is fire-and-forget.
pub trait Alerts: Send + Sync {
    fn success(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sends alerts to the log only.
pub struct LogAlerts;

impl Alerts for LogAlerts {
    fn success(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Logs alerts and echoes them to stderr; used by one-shot commands.
pub struct StderrAlerts;

impl Alerts for StderrAlerts {
    fn success(&self, message: &str) {
        LogAlerts.success(message);
        eprintln!("{message}");
    }

    fn info(&self, message: &str) {
        LogAlerts.info(message);
        eprintln!("info: {message}");
    }

    fn warn(&self, message: &str) {
        LogAlerts.warn(message);
        eprintln!("warning: {message}");
    }

    fn error(&self, message: &str) {
        LogAlerts.error(message);
        eprintln!("error: {message}");
    }
}

/// Bounded list of recent alerts, newest last, shared with the console.
#[derive(Clone, Default)]
pub struct AlertFeed {
    alerts: Arc<Mutex<VecDeque<Alert>>>,
}

impl AlertFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Alert> {
        self.alerts.lock().ok()?.back().cloned()
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dismiss(&self) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.pop_back();
        }
    }

    fn push(&self, level: AlertLevel, message: &str) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push_back(Alert {
                level,
                message: message.to_string(),
            });
            while alerts.len() > MAX_FEED_SIZE {
                alerts.pop_front();
            }
        }
    }
}

impl Alerts for AlertFeed {
    fn success(&self, message: &str) {
        LogAlerts.success(message);
        self.push(AlertLevel::Success, message);
    }

    fn info(&self, message: &str) {
        LogAlerts.info(message);
        self.push(AlertLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        LogAlerts.warn(message);
        self.push(AlertLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        LogAlerts.error(message);
        self.push(AlertLevel::Error, message);
    }
}
