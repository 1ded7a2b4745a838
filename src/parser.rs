//! Turns free-text spending descriptions into structured line items with a
//! chat-completion service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Category, CurrencyCode, Error};

/// One purchase extracted from a description.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    /// A short summary of the purchase, e.g. "Lunch".
    pub name: String,
    /// The spending category.
    pub category: Category,
    /// The amount as returned by the service. It is validated when the item
    /// is ingested, since the service may return something that is not a number.
    pub amount: Value,
    /// The currency of `amount`.
    pub currency: CurrencyCode,
}

/// Parses free text into line items.
#[async_trait]
pub trait DescriptionParser: std::fmt::Debug + Send + Sync {
    /// Extract the line items in `description`, in the order they appear.
    ///
    /// # Errors
    /// Returns [Error::Parse] if the service fails or its output is not a list
    /// of line items. Malformed output is never reported as zero items.
    async fn parse(&self, description: &str) -> Result<Vec<LineItem>, Error>;
}

/// Settings for [ChatCompletionParser].
#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    /// The chat completions endpoint, e.g. "https://api.openai.com/v1/chat/completions".
    pub url: String,
    /// The bearer token for the service.
    pub api_key: String,
    /// The model to ask, e.g. "gpt-4o-mini".
    pub model: String,
    /// The currency assumed when a description does not state one.
    pub base_currency: CurrencyCode,
    /// How long to wait for the service before giving up.
    pub timeout: Duration,
}

/// A [DescriptionParser] backed by an OpenAI compatible chat completions API.
#[derive(Debug, Clone)]
pub struct ChatCompletionParser {
    http: reqwest::Client,
    config: ChatCompletionConfig,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are a financial accountant that translates text descriptions of \
    spending into JSON. If the description contains more than one transaction, separate them. \
    Output only a JSON array.";

impl ChatCompletionParser {
    /// Create a parser with its own HTTP client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ChatCompletionConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| Error::Parse(format!("could not build HTTP client: {error}")))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl DescriptionParser for ChatCompletionParser {
    async fn parse(&self, description: &str) -> Result<Vec<LineItem>, Error> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_owned(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(description, &self.config.base_currency),
                },
            ],
        };

        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| Error::Parse(format!("completion request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Parse(format!("completion service returned {status}")));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| Error::Parse(format!("invalid completion response: {error}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Parse("completion response has no content".to_owned()))?;

        parse_line_items(&content, &self.config.base_currency)
    }
}

fn build_prompt(description: &str, base_currency: &CurrencyCode) -> String {
    let categories = Category::ALL
        .iter()
        .map(|category| category.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Given a description, generate a name of no more than 5 words that summarises each \
        transaction, select the most suitable category from the listed categories, calculate the \
        total amount and extract the currency used.\n\
        If no currency is stated, use {base_currency}. Do not perform any currency conversion.\n\
        If a transaction has no amount, leave it out.\n\n\
        Categories: {categories}\n\
        Description: {description}\n\
        JSON format:\n\
        [{{\"name\": <string>, \"category\": <string>, \"amount\": <number to 2 decimal places>, \
        \"currency\": <ISO 4217 code>}}]"
    )
}

#[derive(Debug, Deserialize)]
struct RawLineItem {
    name: String,
    #[serde(default)]
    category: Value,
    #[serde(default)]
    amount: Value,
    #[serde(default)]
    currency: Option<String>,
}

/// Parse the text returned by the completion service.
///
/// The text must be a JSON array of objects, optionally wrapped in a Markdown
/// code fence. Unknown, missing and non-string categories become
/// [Category::Miscellaneous] and a
/// missing or blank currency becomes `base_currency`.
///
/// # Errors
/// Returns [Error::Parse] if the text is not a JSON array of line items or a
/// currency is not a valid code.
pub fn parse_line_items(content: &str, base_currency: &CurrencyCode) -> Result<Vec<LineItem>, Error> {
    let json = strip_code_fence(content);

    let raw_items: Vec<RawLineItem> = serde_json::from_str(json).map_err(|error| {
        Error::Parse(format!("expected a JSON array of line items: {error}"))
    })?;

    raw_items
        .into_iter()
        .map(|raw_item| -> Result<LineItem, Error> {
            let currency = match raw_item.currency.as_deref().map(str::trim) {
                None | Some("") => base_currency.clone(),
                Some(code) => code
                    .parse()
                    .map_err(|_| Error::Parse(format!("invalid currency {code:?}")))?,
            };

            // The service sometimes returns null or a number for the category.
            let category = match &raw_item.category {
                Value::String(category) => Category::coerce(category),
                _ => Category::Miscellaneous,
            };

            Ok(LineItem {
                name: raw_item.name,
                category,
                amount: raw_item.amount,
                currency,
            })
        })
        .collect()
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();

    match trimmed.strip_prefix("```") {
        Some(fenced) => {
            let body = fenced.trim_start_matches("json");
            body.strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    }
}
