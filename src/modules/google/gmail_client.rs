use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ensure_success, parse_error, request_error, MailApi};
use crate::core::error::Result;

const SERVICE: &str = "Gmail";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    email_address: String,
}

/// Bytes of UTF-8 per encoded-word. 39 bytes give a 64 character word, which keeps
/// `Subject: ` plus the word within the 76 character line limit of RFC 2047.
const ENCODED_WORD_BYTES: usize = 39;

/// Encode a header value as RFC 2047 encoded-words when it is not plain ASCII.
///
/// Long values are split on character boundaries and folded onto continuation lines.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    for (index, c) in value.char_indices() {
        if index + c.len_utf8() - start > ENCODED_WORD_BYTES {
            words.push(&value[start..index]);
            start = index;
        }
    }
    words.push(&value[start..]);

    words
        .iter()
        .map(|chunk| format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Render a plain-text RFC 5322 message
fn compose_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    let body = body.replace("\r\n", "\n").replace('\n', "\r\n");
    format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"utf-8\"\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}",
        from,
        to,
        encode_header(subject),
        body
    )
}

/// Client for the Gmail v1 REST API
pub struct GmailClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(http_client: reqwest::Client, base_url: String, access_token: String) -> Self {
        Self {
            http_client,
            base_url,
            access_token,
        }
    }
}

#[async_trait]
impl MailApi for GmailClient {
    async fn profile_email(&self) -> Result<String> {
        let url = format!("{}/users/me/profile", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let profile = ensure_success(response, SERVICE)
            .await?
            .json::<Profile>()
            .await
            .map_err(|e| parse_error(SERVICE, e))?;

        Ok(profile.email_address)
    }

    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()> {
        let url = format!("{}/users/me/messages/send", self.base_url);
        let raw = URL_SAFE.encode(compose_message(from, to, subject, body));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        ensure_success(response, SERVICE).await?;

        info!("Email sent to {}: {}", to, subject);
        Ok(())
    }
}
