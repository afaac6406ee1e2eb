//! Best-effort out-of-band delivery of plaintext activation codes.
//!
//! The operator receives the full code over Telegram; the server never
//! persists it. Delivery is fire-and-forget with a hard timeout: a failed
//! send does not invalidate the issued code, but the outcome is reported to
//! the caller so silent loss is detectable.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

/// Hard timeout for one notification attempt.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// What the operator gets told about a new activation request.
#[derive(Debug, Clone)]
pub struct ActivationNotice {
    pub hwid: String,
    pub device_name: String,
    /// Plaintext code; lives only in memory on its way to the operator.
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl ActivationNotice {
    /// Renders the operator-facing message text.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "New activation request\nHWID: {}\nDevice: {}\nCode: {}\nTime: {}",
            self.hwid,
            self.device_name,
            self.code,
            self.created_at.to_rfc3339(),
        )
    }
}

/// The configured notification sink.
pub enum Notifier {
    /// Deliver via the Telegram Bot API.
    Telegram(TelegramSink),
    /// No sink configured; every send reports failure.
    Disabled,
}

impl Notifier {
    /// Sends a notice, returning whether delivery succeeded.
    ///
    /// Never fails hard: transport errors are logged and reported as
    /// `false`.
    pub async fn send(&self, notice: &ActivationNotice) -> bool {
        match self {
            Self::Telegram(sink) => sink.send(notice).await,
            Self::Disabled => {
                debug!("notification sink disabled; skipping send");
                false
            }
        }
    }
}

/// Telegram Bot API sink.
pub struct TelegramSink {
    client: reqwest::Client,
    token: String,
    chat_id: String,
    api_base: String,
}

impl TelegramSink {
    /// Builds a sink for the given bot token and chat id.
    ///
    /// # Errors
    ///
    /// Returns the underlying client build error if the HTTP client cannot
    /// be constructed.
    pub fn new(token: String, chat_id: String) -> Result<Self, reqwest::Error> {
        Self::with_api_base(token, chat_id, "https://api.telegram.org".to_string())
    }

    /// Builds a sink pointed at a custom API base URL (for testing).
    ///
    /// # Errors
    ///
    /// Returns the underlying client build error if the HTTP client cannot
    /// be constructed.
    pub fn with_api_base(
        token: String,
        chat_id: String,
        api_base: String,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            token,
            chat_id,
            api_base,
        })
    }

    async fn send(&self, notice: &ActivationNotice) -> bool {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = json!({
            "chat_id": self.chat_id,
            "text": notice.render(),
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                let ok = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("ok").and_then(serde_json::Value::as_bool))
                    .unwrap_or(false);
                if !ok {
                    warn!("telegram rejected notification for hwid {}", notice.hwid);
                }
                ok
            }
            Ok(resp) => {
                warn!(
                    "telegram notification failed with status {} for hwid {}",
                    resp.status(),
                    notice.hwid
                );
                false
            }
            Err(e) => {
                warn!("telegram notification error for hwid {}: {e}", notice.hwid);
                false
            }
        }
    }
}
