//! Telegram Bot API notifier.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::analyzer::types::{Action, AnalysisResult};
use crate::config::TelegramConfig;
use crate::error::SourceError;
use crate::sources::{Command, HttpSource, Notifier, SentMessage};

/// Telegram rejects photo captions longer than this.
const MAX_CAPTION_LEN: usize = 1024;
/// Passed criteria listed in an alert before the list is elided.
const LISTED_CRITERIA: usize = 10;
const LISTED_SOCIALS: usize = 3;

/// Escape the three characters Telegram's HTML parse mode cares about.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Whole-dollar amount with thousands separators: 1234567.8 → "1,234,568".
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = value.abs().round() as u64;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 && rounded > 0 {
        out.insert(0, '-');
    }
    out
}

/// Render the HTML alert for one analysis result.
pub fn format_alert(result: &AnalysisResult) -> String {
    let s = &result.snapshot;
    let emoji = if result.action == Action::HighPriority { "🟢" } else { "⚠️" };

    let web_link = s
        .primary_website()
        .map(|url| format!(" <a href='{}'>[Web]</a>", escape_html(url)))
        .unwrap_or_default();
    let social_links = s
        .socials
        .iter()
        .take(LISTED_SOCIALS)
        .map(|l| format!("<a href='{}'>[{}]</a>", escape_html(&l.url), escape_html(&l.kind)))
        .collect::<Vec<_>>()
        .join(" ");

    let passed = result.breakdown.passed();
    let mut passed_text = passed
        .iter()
        .take(LISTED_CRITERIA)
        .map(|name| format!("✅ {}", name))
        .collect::<Vec<_>>()
        .join("\n");
    if passed.len() > LISTED_CRITERIA {
        passed_text.push_str(&format!("\n...and {} more", passed.len() - LISTED_CRITERIA));
    }

    format!(
        "{emoji} <b>{action} {score:.0}/100</b>\n\
         🎯 <b>Strictness: {passes}/20 Passed</b> | Risk: {risk}\n\n\
         🪙 <b>{name}</b> ({symbol})\n\
         <code>{address}</code>\n\
         🔗 Chain: {chain}{web_link} {social_links}\n\n\
         💧 Liq: ${liq} | 🧢 MC: ${fdv}\n\
         🚀 <b>Potential: ${predicted} ({multiple:.1}x)</b>\n\
         📊 1H Vol: ${volume} | ⏰ Age: {age:.1}m\n\n\
         <b>🛡️ Verified Criteria:</b>\n{passed_text}\n\n\
         ❌ Failed: {failed} items\n\
         🚩 Risks: {risks}\n\n\
         <a href='{url}'>🔎 View on DexScreener</a>",
        action = result.action,
        score = result.score(),
        passes = result.breakdown.checklist_passes,
        risk = result.risk_level.as_str(),
        name = escape_html(&s.base_token_name),
        symbol = escape_html(&s.base_token_symbol),
        address = escape_html(&s.base_token_address),
        chain = escape_html(&s.chain_id),
        liq = format_usd(s.liquidity_usd),
        fdv = format_usd(s.fdv),
        predicted = format_usd(result.predicted_fdv),
        multiple = result.predicted_multiple(),
        volume = format_usd(s.volume_h1),
        age = result.params.token_age_minutes,
        failed = result.breakdown.failed().len(),
        risks = result.risk_flags,
        url = escape_html(&s.url),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    result: Value,
}

impl ApiResponse {
    fn into_result(self, method: &str) -> Result<Value, SourceError> {
        if !self.ok {
            return Err(SourceError::MalformedResponse(
                self.description.unwrap_or_else(|| format!("{} not ok", method)),
            ));
        }
        Ok(self.result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMessage {
    message_id: i64,
    chat: RawChat,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
}

/// Commands addressed to `chat_id` in a getUpdates body, plus the next offset.
/// The offset only moves forward.
pub fn parse_updates(body: Value, chat_id: &str, cursor: i64) -> Result<(Vec<Command>, i64), SourceError> {
    let response: ApiResponse = serde_json::from_value(body)?;
    let updates: Vec<RawUpdate> = match response.into_result("getUpdates")? {
        Value::Null => Vec::new(),
        result => serde_json::from_value(result)?,
    };

    let next = updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .map_or(cursor, |n| n.max(cursor));

    let commands = updates
        .into_iter()
        .filter_map(|u| u.message)
        .filter(|m| m.chat.id.to_string() == chat_id)
        .filter_map(|m| m.text.as_deref().and_then(Command::parse))
        .collect();

    Ok((commands, next))
}

pub struct TelegramNotifier {
    http: Arc<HttpSource>,
    api_base: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(http: Arc<HttpSource>, base_url: &str, config: &TelegramConfig) -> Self {
        Self {
            http,
            api_base: format!("{}/bot{}", base_url.trim_end_matches('/'), config.bot_token),
            chat_id: config.chat_id.clone(),
        }
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value, SourceError> {
        let url = format!("{}/{}", self.api_base, method);
        let body = self.http.send_json(self.http.client().post(&url).json(&payload)).await?;
        let response: ApiResponse = serde_json::from_value(body)?;
        response.into_result(method)
    }

    async fn deliver(&self, method: &str, payload: Value) -> Option<SentMessage> {
        match self.call(method, payload).await {
            Ok(result) => match serde_json::from_value::<RawMessage>(result) {
                Ok(message) => Some(SentMessage {
                    destination: self.chat_id.clone(),
                    message_id: message.message_id,
                }),
                Err(e) => {
                    warn!("Telegram {} returned an unexpected message: {}", method, e);
                    None
                }
            },
            Err(e) => {
                error!("Telegram {} failed: {}", method, e);
                None
            }
        }
    }

    fn text_payload(&self, text: &str) -> Value {
        json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip_all, fields(pair = %result.snapshot.pair_address))]
    async fn send(&self, result: &AnalysisResult) -> Option<SentMessage> {
        let message = format_alert(result);
        match result.snapshot.icon_url.as_deref() {
            Some(icon) if message.chars().count() <= MAX_CAPTION_LEN => {
                let payload = json!({
                    "chat_id": self.chat_id,
                    "photo": icon,
                    "caption": message,
                    "parse_mode": "HTML",
                });
                self.deliver("sendPhoto", payload).await
            }
            _ => self.deliver("sendMessage", self.text_payload(&message)).await,
        }
    }

    async fn send_text(&self, text: &str) -> Option<SentMessage> {
        self.deliver("sendMessage", self.text_payload(text)).await
    }

    async fn retract(&self, message: &SentMessage) {
        let payload = json!({ "chat_id": message.destination, "message_id": message.message_id });
        // Old or already-deleted messages are rejected by Telegram; nothing to do about it
        if let Err(e) = self.call("deleteMessage", payload).await {
            debug!("deleteMessage {} ignored: {}", message.message_id, e);
        }
    }

    async fn poll_commands(&self, cursor: i64) -> (Vec<Command>, i64) {
        let url = format!("{}/getUpdates", self.api_base);
        let request = self
            .http
            .client()
            .get(&url)
            .query(&[("offset", cursor), ("timeout", 1)]);
        let polled = match self.http.send_json(request).await {
            Ok(body) => parse_updates(body, &self.chat_id, cursor),
            Err(e) => Err(e),
        };
        polled.unwrap_or_else(|e| {
            debug!("getUpdates failed: {}", e);
            (Vec::new(), cursor)
        })
    }
}

/// Notifier used when no Telegram credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _result: &AnalysisResult) -> Option<SentMessage> {
        None
    }

    async fn send_text(&self, _text: &str) -> Option<SentMessage> {
        None
    }

    async fn retract(&self, _message: &SentMessage) {}

    async fn poll_commands(&self, cursor: i64) -> (Vec<Command>, i64) {
        (Vec::new(), cursor)
    }
}
