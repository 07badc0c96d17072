use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{DeliveryChannel, SendError};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Characters MarkdownV2 treats as markup.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Prefixes every MarkdownV2 special character with a backslash.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Telegram Bot API `sendMessage` client bound to one chat.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    send_url: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, bot_token: &str, chat_id: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            send_url: format!(
                "{}/bot{}/sendMessage",
                api_url.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.into(),
        })
    }
}

#[async_trait]
impl DeliveryChannel for TelegramClient {
    #[instrument(skip(self, text), fields(len = text.len()), level = "debug")]
    async fn send(&self, text: &str) -> Result<(), SendError> {
        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
        };

        // Urls carry the bot token; strip them from every error.
        let resp = self
            .http
            .post(&self.send_url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let parsed = resp.json::<ApiResponse>().await.ok();

        if status.is_success() && parsed.as_ref().is_some_and(|r| r.ok) {
            debug!("telegram accepted message");
            return Ok(());
        }

        Err(classify_failure(status, parsed.as_ref()))
    }

    fn escape(&self, text: &str) -> String {
        escape_markdown_v2(text)
    }
}

fn transport_error(e: reqwest::Error) -> SendError {
    if e.is_timeout() {
        SendError::Timeout
    } else {
        SendError::Transient(e.without_url().to_string())
    }
}

fn classify_failure(status: StatusCode, resp: Option<&ApiResponse>) -> SendError {
    let description = resp
        .and_then(|r| r.description.clone())
        .unwrap_or_else(|| format!("http status {status}"));

    let retry_after = resp
        .and_then(|r| r.parameters.as_ref())
        .and_then(|p| p.retry_after);

    match (status, retry_after) {
        (StatusCode::TOO_MANY_REQUESTS, Some(secs)) => {
            SendError::RetryAfter(Duration::from_secs(secs))
        }
        // 400 covers unknown chats and unparsable markup; neither changes
        // between attempts.
        (
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND,
            _,
        ) => SendError::Fatal(description),
        _ => SendError::Transient(description),
    }
}
