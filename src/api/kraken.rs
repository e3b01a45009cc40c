use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::Exchange;
use crate::config::{Settings, KRAKEN_API_URL};
use crate::error::KrakenError;
use crate::models::{Balances, CancelAck, Candle, OhlcPage, OpenOrder, OpenPosition, OrderSide};

type HmacSha512 = Hmac<Sha512>;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============== Response Types ==============

/// Every Kraken response is wrapped in `{"error": [...], "result": ...}`
#[derive(Debug, Deserialize)]
struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

/// `[time, open, high, low, close, vwap, volume, count]`
#[derive(Debug, Deserialize)]
struct RawOhlcRow(i64, String, String, String, String, String, String, u64);

#[derive(Debug, Deserialize)]
struct OpenOrdersResult {
    #[serde(default)]
    open: BTreeMap<String, RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    descr: RawOrderDescr,
    vol: String,
}

#[derive(Debug, Deserialize)]
struct RawOrderDescr {
    pair: String,
    #[serde(rename = "type")]
    side: OrderSide,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    pair: String,
    #[serde(rename = "type")]
    side: OrderSide,
    vol: String,
}

struct Credentials {
    api_key: String,
    secret: Vec<u8>, // base64-decoded
}

// ============== Client ==============

/// Client for the Kraken REST API
///
/// Performs exactly one HTTP request per operation. There is no retry or
/// rate limiting; transport errors are returned to the caller as-is.
pub struct KrakenClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    query_open_orders: bool,
    last_nonce: AtomicU64,
}

impl KrakenClient {
    /// Create a client with credentials for private endpoints.
    ///
    /// Empty key or secret gives a client that can only call public endpoints.
    pub fn new(api_key: &str, api_secret: &str) -> Result<Self, KrakenError> {
        let credentials = if api_key.is_empty() || api_secret.is_empty() {
            None
        } else {
            let secret = BASE64
                .decode(api_secret.trim())
                .map_err(|_| KrakenError::InvalidSecret)?;
            Some(Credentials {
                api_key: api_key.to_string(),
                secret,
            })
        };

        Ok(Self {
            client: Self::http_client(DEFAULT_TIMEOUT_SECS)?,
            base_url: KRAKEN_API_URL.to_string(),
            credentials,
            query_open_orders: false,
            last_nonce: AtomicU64::new(0),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, KrakenError> {
        Ok(Self::new(&settings.api_key, &settings.api_secret)?
            .with_base_url(&settings.api_url)
            .with_timeout(settings.request_timeout_secs)?
            .with_open_order_queries(settings.query_open_orders))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Result<Self, KrakenError> {
        self.client = Self::http_client(timeout_secs)?;
        Ok(self)
    }

    /// Enable the real OpenOrders/OpenPositions queries.
    ///
    /// Off by default: both calls then report nothing open without touching
    /// the network.
    pub fn with_open_order_queries(mut self, enabled: bool) -> Self {
        self.query_open_orders = enabled;
        self
    }

    fn http_client(timeout_secs: u64) -> Result<Client, KrakenError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?)
    }

    /// Strictly increasing nonce derived from the wall clock (microseconds)
    fn next_nonce(&self) -> u64 {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let mut prev = self.last_nonce.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_nonce.compare_exchange_weak(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Build the endpoint URL and the form-encoded body for `params`
    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<(Url, String), KrakenError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| KrakenError::InvalidUrl(e.to_string()))?;

        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        let body = url.query().unwrap_or_default().to_string();
        url.set_query(None);

        Ok((url, body))
    }

    async fn public<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, KrakenError> {
        let (url, body) = self.endpoint(&format!("/0/public/{}", method), params)?;
        tracing::debug!("Kraken public {} {}", method, body);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        Self::unwrap_response(response).await
    }

    async fn private<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, KrakenError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(KrakenError::MissingCredentials(method))?;

        let path = format!("/0/private/{}", method);
        let nonce = self.next_nonce();
        let mut signed_params = vec![("nonce", nonce.to_string())];
        signed_params.extend(params.iter().cloned());

        let (url, body) = self.endpoint(&path, &signed_params)?;
        let signature = sign(&path, nonce, &body, &credentials.secret)?;
        tracing::debug!("Kraken private {}", method);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("API-Key", &credentials.api_key)
            .header("API-Sign", signature)
            .body(body)
            .send()
            .await?;

        Self::unwrap_response(response).await
    }

    async fn unwrap_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, KrakenError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(KrakenError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: KrakenResponse<T> = serde_json::from_str(&text)
            .map_err(|e| KrakenError::Malformed(format!("invalid JSON envelope: {}", e)))?;

        if !envelope.error.is_empty() {
            return Err(KrakenError::Api(envelope.error));
        }

        envelope
            .result
            .ok_or_else(|| KrakenError::Malformed("response has no result".to_string()))
    }

    // ============== Market data ==============

    /// Get OHLC candles plus the `last` cursor
    /// Endpoint: POST /0/public/OHLC
    pub async fn get_ohlc_page(
        &self,
        pair: &str,
        interval: u32,
        since: Option<i64>,
    ) -> Result<OhlcPage, KrakenError> {
        let mut params = vec![("pair", pair.to_string()), ("interval", interval.to_string())];
        if let Some(since) = since {
            params.push(("since", since.to_string()));
        }

        let result: serde_json::Map<String, Value> = self.public("OHLC", &params).await?;
        let page = parse_ohlc(pair, result)?;

        tracing::debug!("Fetched {} candles for {}", page.candles.len(), pair);
        Ok(page)
    }

    /// Most recent candles Kraken serves for `pair` (up to 720)
    pub async fn get_recent_ohlc(&self, pair: &str, interval: u32) -> Result<Vec<Candle>, KrakenError> {
        Ok(self.get_ohlc_page(pair, interval, None).await?.candles)
    }

    // ============== Account ==============

    /// Endpoint: POST /0/private/Balance
    pub async fn get_balance(&self) -> Result<Balances, KrakenError> {
        let raw: BTreeMap<String, String> = self.private("Balance", &[]).await?;
        raw.into_iter()
            .map(|(asset, amount)| -> Result<(String, f64), KrakenError> {
                Ok((asset, parse_decimal("balance", &amount)?))
            })
            .collect()
    }

    /// Endpoint: POST /0/private/OpenOrders, filtered to `pair`
    pub async fn get_open_orders(&self, pair: &str) -> Result<Vec<OpenOrder>, KrakenError> {
        if !self.query_open_orders {
            tracing::debug!("Open order queries disabled, reporting none for {}", pair);
            return Ok(Vec::new());
        }

        let result: OpenOrdersResult = self.private("OpenOrders", &[]).await?;
        result
            .open
            .into_iter()
            .filter(|(_, order)| order.descr.pair == pair)
            .map(|(txid, order)| -> Result<OpenOrder, KrakenError> {
                Ok(OpenOrder {
                    txid,
                    pair: order.descr.pair,
                    side: order.descr.side,
                    volume: parse_decimal("vol", &order.vol)?,
                })
            })
            .collect()
    }

    /// Endpoint: POST /0/private/OpenPositions
    pub async fn get_open_positions(&self) -> Result<Vec<OpenPosition>, KrakenError> {
        if !self.query_open_orders {
            tracing::debug!("Open position queries disabled, reporting none");
            return Ok(Vec::new());
        }

        let result: BTreeMap<String, RawPosition> = self.private("OpenPositions", &[]).await?;
        result
            .into_iter()
            .map(|(txid, position)| -> Result<OpenPosition, KrakenError> {
                Ok(OpenPosition {
                    txid,
                    pair: position.pair,
                    side: position.side,
                    volume: parse_decimal("vol", &position.vol)?,
                })
            })
            .collect()
    }

    // ============== Trading ==============

    /// Endpoint: POST /0/private/CancelOrder
    pub async fn cancel_order(&self, txid: &str) -> Result<CancelAck, KrakenError> {
        tracing::info!("CancelOrder txid={}", txid);
        self.private("CancelOrder", &[("txid", txid.to_string())])
            .await
    }

    /// Market orders are never sent; this always fails without a request.
    pub async fn place_market_order(
        &self,
        pair: &str,
        side: OrderSide,
        volume: f64,
    ) -> Result<String, KrakenError> {
        tracing::warn!(
            "Refusing to place market {} of {} {}: order placement is disabled",
            side,
            volume,
            pair
        );
        Err(KrakenError::NotImplemented("AddOrder"))
    }
}

impl Exchange for KrakenClient {
    async fn fetch_candles(
        &self,
        pair: &str,
        interval: u32,
        since: Option<i64>,
    ) -> Result<Vec<Candle>, KrakenError> {
        Ok(self.get_ohlc_page(pair, interval, since).await?.candles)
    }

    async fn fetch_balance(&self) -> Result<Balances, KrakenError> {
        self.get_balance().await
    }

    async fn fetch_open_orders(&self, pair: &str) -> Result<Vec<OpenOrder>, KrakenError> {
        self.get_open_orders(pair).await
    }

    async fn fetch_open_positions(&self) -> Result<Vec<OpenPosition>, KrakenError> {
        self.get_open_positions().await
    }

    async fn cancel_order(&self, txid: &str) -> Result<CancelAck, KrakenError> {
        KrakenClient::cancel_order(self, txid).await
    }

    async fn place_market_order(
        &self,
        pair: &str,
        side: OrderSide,
        volume: f64,
    ) -> Result<String, KrakenError> {
        KrakenClient::place_market_order(self, pair, side, volume).await
    }
}

// ============== Helpers ==============

/// `API-Sign` header value:
/// base64(HMAC-SHA512(secret, path || SHA256(nonce || post_data)))
pub fn sign(path: &str, nonce: u64, post_data: &str, secret: &[u8]) -> Result<String, KrakenError> {
    let mut sha = Sha256::new();
    sha.update(nonce.to_string().as_bytes());
    sha.update(post_data.as_bytes());
    let digest = sha.finalize();

    let mut mac = HmacSha512::new_from_slice(secret).map_err(|_| KrakenError::InvalidSecret)?;
    mac.update(path.as_bytes());
    mac.update(&digest);

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn parse_decimal(field: &str, raw: &str) -> Result<f64, KrakenError> {
    raw.parse::<f64>()
        .map_err(|_| KrakenError::Malformed(format!("{} is not a number: {:?}", field, raw)))
}

fn parse_ohlc(
    pair: &str,
    mut result: serde_json::Map<String, Value>,
) -> Result<OhlcPage, KrakenError> {
    let last = result.get("last").and_then(Value::as_i64);
    let rows = result
        .remove(pair)
        .ok_or_else(|| KrakenError::MissingPair(pair.to_string()))?;

    let rows: Vec<RawOhlcRow> = serde_json::from_value(rows)
        .map_err(|e| KrakenError::Malformed(format!("OHLC rows for {}: {}", pair, e)))?;

    let candles = rows
        .into_iter()
        .map(|RawOhlcRow(time, open, high, low, close, vwap, volume, count)| -> Result<Candle, KrakenError> {
            Ok(Candle {
                timestamp: DateTime::<Utc>::from_timestamp(time, 0).ok_or_else(|| {
                    KrakenError::Malformed(format!("timestamp out of range: {}", time))
                })?,
                open: parse_decimal("open", &open)?,
                high: parse_decimal("high", &high)?,
                low: parse_decimal("low", &low)?,
                close: parse_decimal("close", &close)?,
                vwap: parse_decimal("vwap", &vwap)?,
                volume: parse_decimal("volume", &volume)?,
                count,
            })
        })
        .collect::<Result<Vec<_>, KrakenError>>()?;

    Ok(OhlcPage { candles, last })
}
