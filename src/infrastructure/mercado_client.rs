//! Mercado Bitcoin REST Client
//!
//! Authenticated calls use the exchange's timestamp + HMAC-SHA256 scheme:
//! the signature covers `timestamp + METHOD + path + canonical_body`, where
//! the canonical body is the sorted-key, compact JSON encoding. The exact
//! canonical string is also sent as the request body, so the bytes on the
//! wire are always the bytes that were signed.

use crate::config::{AuthHeaders, TradingConfig};
use crate::domain::trade::Side;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

type HmacSha256 = Hmac<Sha256>;

/// Errors raised by exchange operations
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("exchange returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("signing error: {0}")]
    Signature(String),

    #[error("failed to encode request body: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Client for the Mercado Bitcoin v4 REST API.
pub struct MercadoBitcoinClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    auth_headers: AuthHeaders,
}

impl MercadoBitcoinClient {
    pub fn new(config: &TradingConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            auth_headers: config.auth_headers.clone(),
        })
    }

    /// Sorted-key, compact JSON encoding of a request body. This exact
    /// string is both signed and transmitted.
    fn canonical_body(body: &BTreeMap<&str, String>) -> Result<String, ExchangeError> {
        Ok(serde_json::to_string(body)?)
    }

    /// Lowercase hex HMAC-SHA256 over `timestamp + METHOD + path + body`.
    fn signature(
        secret: &str,
        timestamp: &str,
        method: &str,
        path: &str,
        canonical_body: &str,
    ) -> Result<String, ExchangeError> {
        let message = format!(
            "{}{}{}{}",
            timestamp,
            method.to_uppercase(),
            path,
            canonical_body
        );
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ExchangeError::Signature(e.to_string()))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&BTreeMap<&str, String>>,
    ) -> Result<Value, ExchangeError> {
        let payload = match body {
            Some(body) => Self::canonical_body(body)?,
            None => String::new(),
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ExchangeError::Signature(e.to_string()))?
            .as_secs()
            .to_string();
        let signature = Self::signature(
            &self.api_secret,
            &timestamp,
            method.as_str(),
            path,
            &payload,
        )?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header(&self.auth_headers.key, &self.api_key)
            .header(&self.auth_headers.signature, signature)
            .header(&self.auth_headers.timestamp, timestamp);

        if !payload.is_empty() {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(payload);
        }

        let response = request.send().await?;
        Self::parse_response(response).await
    }

    async fn parse_response(response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    /// Latest market snapshot for a symbol. Public endpoint, no signing.
    /// The exchange answers with a one-element list; its first element is
    /// returned.
    pub async fn ticker(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let url = format!("{}/tickers", self.base_url);
        debug!("Fetching ticker for {}", symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("symbols", symbol)])
            .send()
            .await?;
        let parsed = Self::parse_response(response).await?;

        match parsed {
            Value::Array(mut items) if !items.is_empty() => Ok(items.remove(0)),
            other => Ok(other),
        }
    }

    /// Place an order. Amounts and prices travel as decimal strings; the
    /// signed canonical body is the wire body.
    pub async fn place_order(
        &self,
        symbol: &str,
        side: Side,
        amount: f64,
        price: Option<f64>,
        order_type: &str,
    ) -> Result<Value, ExchangeError> {
        let mut body = BTreeMap::new();
        body.insert("symbol", symbol.to_string());
        body.insert("side", side.to_string());
        body.insert("type", order_type.to_string());
        body.insert("amount", amount.to_string());
        if let Some(price) = price {
            body.insert("price", price.to_string());
        }

        info!(
            "Placing {} {} order: {} {} @ {:?}",
            order_type, side, amount, symbol, price
        );
        self.signed_request(Method::POST, "/orders", Some(&body)).await
    }
}
