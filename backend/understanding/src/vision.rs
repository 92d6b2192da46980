/// Vision understanding: read documents with a vision-language model served
/// behind an OpenAI-compatible chat completions endpoint.
use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, RgbImage};
use ocr_bridge_core::{ChatTurn, Device, Precision, VisionModel};
use serde_json::{json, Value};
use tracing::info;

/// A VLM reachable over HTTP.
#[derive(Debug, Clone)]
pub struct OpenAiVisionModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    device: Device,
    precision: Precision,
}

impl OpenAiVisionModel {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        device: Device,
        precision: Precision,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            max_tokens: 4096,
            device,
            precision,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(&self, image: &RgbImage, prompt: &str, history: &[ChatTurn]) -> Result<String> {
        info!(
            model = %self.model,
            device = %self.device,
            precision = %self.precision,
            "[Vision] Reading image"
        );
        let data_url = png_data_url(image)?;
        let body = chat_request_body(&self.model, &data_url, prompt, history, self.max_tokens);

        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("VLM endpoint {} unreachable", self.endpoint))?;
        if !resp.status().is_success() {
            let status = resp.status();
            bail!("VLM error ({status}): {}", resp.text().await.unwrap_or_default());
        }
        let json: Value = resp.json().await?;
        extract_reply(&json)
    }
}

/// Build the chat completions request body. History turns precede the image
/// message.
pub fn chat_request_body(
    model: &str,
    data_url: &str,
    prompt: &str,
    history: &[ChatTurn],
    max_tokens: u32,
) -> Value {
    let mut messages: Vec<Value> = history
        .iter()
        .map(|turn| json!({ "role": turn.role, "content": turn.content }))
        .collect();
    messages.push(json!({
        "role": "user",
        "content": [
            { "type": "image_url", "image_url": { "url": data_url } },
            { "type": "text", "text": prompt }
        ]
    }));
    json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
        "temperature": 0.0
    })
}

/// Pull the assistant's reply out of a chat completions response.
pub fn extract_reply(json: &Value) -> Result<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("VLM response has no message content: {json}"))
}

fn png_data_url(image: &RgbImage) -> Result<String> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .context("failed to encode image for the VLM")?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(buf.into_inner())))
}
