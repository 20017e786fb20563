//! Daily motivational quote: a one-shot provider call keyed off the number of
//! pending tasks, with a fixed quote standing in for every failure.

use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Config;

pub const FALLBACK_QUOTE: &str = "The only way to do great work is to love what you do.";
pub const FALLBACK_AUTHOR: &str = "Steve Jobs";

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub quote: String,
    pub author: String,
}

impl Quote {
    pub fn fallback() -> Self {
        Self {
            quote: FALLBACK_QUOTE.to_string(),
            author: FALLBACK_AUTHOR.to_string(),
        }
    }

    /// Trims both fields; a blank field makes the quote unusable.
    pub fn validated(self) -> anyhow::Result<Self> {
        let quote = self.quote.trim();
        let author = self.author.trim();
        if quote.is_empty() || author.is_empty() {
            bail!("quote or author is blank");
        }
        Ok(Self {
            quote: quote.to_string(),
            author: author.to_string(),
        })
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// One attempt, no retries. `pending` is the number of open tasks.
    async fn fetch(&self, pending: usize) -> anyhow::Result<Quote>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotivationState {
    Idle,
    Loading,
    Ready(Quote),
}

/// Proof that a refresh was started; carries the only input the fetch sees.
#[derive(Debug)]
#[must_use]
pub struct RefreshTicket {
    pending: usize,
}

impl RefreshTicket {
    pub fn pending(&self) -> usize {
        self.pending
    }
}

#[derive(Debug)]
pub struct MotivationController {
    state: MotivationState,
    timeout: Option<Duration>,
}

impl MotivationController {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            state: MotivationState::Idle,
            timeout,
        }
    }

    pub fn state(&self) -> &MotivationState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == MotivationState::Loading
    }

    pub fn quote(&self) -> Option<&Quote> {
        match &self.state {
            MotivationState::Ready(quote) => Some(quote),
            _ => None,
        }
    }

    /// Enters `Loading`. Returns `None` while a refresh is already in flight.
    pub fn begin(&mut self, pending: usize) -> Option<RefreshTicket> {
        if self.is_loading() {
            debug!("refresh already in flight");
            return None;
        }
        self.state = MotivationState::Loading;
        Some(RefreshTicket { pending })
    }

    /// Leaves `Loading`, always for `Ready`.
    pub fn finish(&mut self, ticket: RefreshTicket, result: anyhow::Result<Quote>) -> Quote {
        let quote = match result.and_then(Quote::validated) {
            Ok(quote) => quote,
            Err(err) => {
                warn!(
                    pending = ticket.pending,
                    error = %format!("{err:#}"),
                    "quote provider failed, using fallback"
                );
                Quote::fallback()
            }
        };
        self.state = MotivationState::Ready(quote.clone());
        quote
    }

    #[instrument(skip(self, provider))]
    pub async fn refresh(&mut self, provider: &dyn QuoteProvider, pending: usize) -> Option<Quote> {
        let ticket = self.begin(pending)?;
        let result = fetch_once(provider, ticket.pending, self.timeout).await;
        Some(self.finish(ticket, result))
    }
}

async fn fetch_once(
    provider: &dyn QuoteProvider,
    pending: usize,
    timeout: Option<Duration>,
) -> anyhow::Result<Quote> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, provider.fetch(pending))
            .await
            .map_err(|_| anyhow!("quote provider timed out after {limit:?}"))?,
        None => provider.fetch(pending).await,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl QuoteSettings {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let timeout_secs = match cfg.get("quote.timeout") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid quote.timeout: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let api_key = cfg
            .get("quote.api_key")
            .or_else(|| API_KEY_ENV_VARS.iter().find_map(|var| std::env::var(var).ok()))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            endpoint: cfg.get("quote.endpoint").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: cfg.get("quote.model").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Asks a Gemini `generateContent` endpoint for a JSON `{quote, author}`.
#[derive(Debug, Clone)]
pub struct GeminiQuoteProvider {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
}

impl GeminiQuoteProvider {
    pub fn new(settings: &QuoteSettings) -> anyhow::Result<Self> {
        let endpoint = Url::parse(settings.endpoint.trim())
            .with_context(|| format!("invalid quote.endpoint: {}", settings.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!("quote.endpoint must be an http(s) URL, got: {endpoint}");
        }
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed building HTTP client for quote provider")?;
        Ok(Self {
            client,
            endpoint,
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl QuoteProvider for GeminiQuoteProvider {
    #[instrument(skip(self), fields(model = %self.model))]
    async fn fetch(&self, pending: usize) -> anyhow::Result<Quote> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("no API key configured for the quote provider");
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.endpoint.as_str().trim_end_matches('/'),
            self.model
        );
        let body = serde_json::to_string(&generate_request(pending))?;
        let response = self
            .client
            .post(url.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-goog-api-key", api_key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("failed requesting {url}"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed reading quote provider response body")?;
        if !status.is_success() {
            bail!("quote provider returned HTTP {status}");
        }

        let quote = parse_generate_response(&text)?;
        info!(author = %quote.author, "fetched quote");
        Ok(quote)
    }
}

fn prompt(pending: usize) -> String {
    format!(
        "Generate a high-impact, short motivational quote for someone who has {pending} tasks to do today. Return as JSON."
    )
}

fn generate_request(pending: usize) -> serde_json::Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt(pending) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "quote": { "type": "STRING" },
                    "author": { "type": "STRING" }
                },
                "required": ["quote", "author"]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn parse_generate_response(body: &str) -> anyhow::Result<Quote> {
    let response: GenerateResponse =
        serde_json::from_str(body).context("quote provider response is not valid JSON")?;
    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or_else(|| anyhow!("quote provider response has no text part"))?;
    let quote: Quote = serde_json::from_str(text.trim()).context("quote text is not a {quote, author} object")?;
    quote.validated()
}
