use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use common::{
    Error, ExposureQuery, Fill, LimitOrder, MarketDataSource, OrderAck, OrderExecutionSink,
    OrderSide, PriceBar, Result, StopMarketOrder,
};

/// Largest `limit` the klines endpoint accepts.
const MAX_KLINES: usize = 1500;

/// REST client for Binance USDⓈ-M futures. Serves candles, open-position
/// queries and order placement.
pub struct BinanceFutures {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
}

impl BinanceFutures {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Client without credentials. Only the public klines endpoint works.
    pub fn public(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::new("", "", base_url, timeout)
    }

    fn timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn sign(&self, query: &str) -> Result<String> {
        sign(&self.secret, query)
    }

    /// Send a signed request. Transport failures are `Error::Http`; the
    /// status is returned so callers decide how a non-2xx answer maps.
    async fn signed(&self, method: Method, path: &str, params: &str) -> Result<(StatusCode, String)> {
        let ts = Self::timestamp_ms();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query)?;
        let signed = format!("{query}&signature={signature}");

        let request = if method == Method::GET {
            self.http
                .get(format!("{}{path}?{signed}", self.base_url))
        } else {
            self.http
                .request(method, format!("{}{path}", self.base_url))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(signed)
        };

        let resp = request
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        Ok((status, body))
    }

    async fn post_order(&self, params: &str) -> Result<String> {
        let (status, body) = self.signed(Method::POST, "/fapi/v1/order", params).await?;
        if !status.is_success() {
            warn!(status = %status, body = %body, "Order rejected by Binance");
            return Err(Error::OrderRejected {
                reason: format!("HTTP {status}: {body}"),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for BinanceFutures {
    async fn bars(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<PriceBar>> {
        let unavailable = |reason: String| Error::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        // One extra row: the still-forming candle is dropped below.
        let request_limit = (limit + 1).min(MAX_KLINES);
        let url = format!(
            "{}/fapi/v1/klines?symbol={symbol}&interval={interval}&limit={request_limit}",
            self.base_url
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status}: {body}")));
        }

        let mut bars = parse_klines(symbol, &body, Utc::now())?;
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        PriceBar::validate_series(symbol, &bars)?;
        debug!(symbol = %symbol, interval = %interval, count = bars.len(), "Fetched klines");
        Ok(bars)
    }
}

#[async_trait]
impl ExposureQuery for BinanceFutures {
    async fn has_open_position(&self, symbol: &str) -> Result<bool> {
        let params = format!("symbol={symbol}");
        let (status, body) = self
            .signed(Method::GET, "/fapi/v2/positionRisk", &params)
            .await?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        position_is_open(symbol, &body)
    }
}

#[async_trait]
impl OrderExecutionSink for BinanceFutures {
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<Fill> {
        let params = format!(
            "symbol={symbol}&side={side}&type=MARKET&quantity={quantity}&newOrderRespType=RESULT"
        );
        debug!(symbol = %symbol, side = %side, qty = %quantity, "Submitting market order");
        let body = self.post_order(&params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;

        let price = resp
            .avg_price
            .as_deref()
            .and_then(|p| Decimal::from_str(p).ok())
            .filter(|p| *p > Decimal::ZERO);
        let executed = resp
            .executed_qty
            .as_deref()
            .and_then(|q| Decimal::from_str(q).ok())
            .filter(|q| *q > Decimal::ZERO)
            .unwrap_or(quantity);

        Ok(Fill {
            order_id: resp.order_id.to_string(),
            symbol: symbol.to_string(),
            side,
            price,
            quantity: executed,
            timestamp: Utc::now(),
        })
    }

    async fn submit_stop_market_order(&self, order: &StopMarketOrder) -> Result<OrderAck> {
        let mut params = format!(
            "symbol={}&side={}&type=STOP_MARKET&stopPrice={}",
            order.symbol, order.side, order.stop_price
        );
        if order.close_position {
            params.push_str("&closePosition=true");
        } else {
            params.push_str(&format!("&quantity={}", order.quantity));
            if order.reduce_only {
                params.push_str("&reduceOnly=true");
            }
        }
        debug!(symbol = %order.symbol, stop = %order.stop_price, "Submitting stop-market order");
        let body = self.post_order(&params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;
        Ok(OrderAck {
            order_id: resp.order_id.to_string(),
            symbol: order.symbol.clone(),
        })
    }

    async fn submit_limit_order(&self, order: &LimitOrder) -> Result<OrderAck> {
        // closePosition is not accepted on LIMIT; a reduce-only quantity is.
        let mut params = format!(
            "symbol={}&side={}&type=LIMIT&price={}&quantity={}&timeInForce={}",
            order.symbol, order.side, order.price, order.quantity, order.time_in_force
        );
        if order.reduce_only || order.close_position {
            params.push_str("&reduceOnly=true");
        }
        debug!(symbol = %order.symbol, price = %order.price, "Submitting limit order");
        let body = self.post_order(&params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;
        Ok(OrderAck {
            order_id: resp.order_id.to_string(),
            symbol: order.symbol.clone(),
        })
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let params = format!("symbol={symbol}&leverage={leverage}");
        let (status, body) = self
            .signed(Method::POST, "/fapi/v1/leverage", &params)
            .await?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        debug!(symbol = %symbol, leverage, "Leverage set");
        Ok(())
    }
}

/// HMAC-SHA256 of `query` keyed by `secret`, hex encoded.
pub fn sign(secret: &str, query: &str) -> Result<String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("invalid signing key: {e}")))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parse a klines response, keeping only candles closed before `now`.
///
/// Rows are `[openTime, open, high, low, close, volume, closeTime, ...]` with
/// prices as strings and times in epoch milliseconds.
pub fn parse_klines(symbol: &str, body: &str, now: DateTime<Utc>) -> Result<Vec<PriceBar>> {
    let malformed = |reason: String| Error::MalformedData {
        symbol: symbol.to_string(),
        reason,
    };

    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    let now_ms = now.timestamp_millis();

    let mut bars = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() < 7 {
            return Err(malformed(format!("kline {i} has {} fields", row.len())));
        }
        let close_time = row[6]
            .as_i64()
            .ok_or_else(|| malformed(format!("kline {i} close time is not an integer")))?;
        if close_time >= now_ms {
            continue;
        }

        let open_ms = row[0]
            .as_i64()
            .ok_or_else(|| malformed(format!("kline {i} open time is not an integer")))?;
        let open_time = Utc
            .timestamp_millis_opt(open_ms)
            .single()
            .ok_or_else(|| malformed(format!("kline {i} open time {open_ms} out of range")))?;

        let number = |idx: usize| -> Result<f64> {
            row[idx]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| malformed(format!("kline {i} field {idx} is not a number")))
        };

        bars.push(PriceBar {
            open_time,
            open: number(1)?,
            high: number(2)?,
            low: number(3)?,
            close: number(4)?,
            volume: number(5)?,
        });
    }
    Ok(bars)
}

/// True when any positionRisk row for `symbol` has a non-zero amount.
pub fn position_is_open(symbol: &str, body: &str) -> Result<bool> {
    let rows: Vec<PositionRisk> = serde_json::from_str(body)?;
    for row in rows.iter().filter(|r| r.symbol == symbol) {
        let amount = Decimal::from_str(&row.position_amt)
            .map_err(|e| Error::Exchange(format!("bad positionAmt '{}': {e}", row.position_amt)))?;
        if !amount.is_zero() {
            return Ok(true);
        }
    }
    Ok(false)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    #[serde(default)]
    avg_price: Option<String>,
    #[serde(default)]
    executed_qty: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_documented_example() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn klines_drop_the_forming_candle() {
        let body = r#"[
            [1700000000000, "100.0", "101.0", "99.0", "100.5", "12.5", 1700003599999, "0", 10, "0", "0", "0"],
            [1700003600000, "100.5", "102.0", "100.1", "101.7", "20.0", 1700007199999, "0", 12, "0", "0", "0"]
        ]"#;
        let now = Utc.timestamp_millis_opt(1_700_005_000_000).unwrap();
        let bars = parse_klines("BTCUSDT", body, now).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 100.5);
        assert_eq!(bars[0].volume, 12.5);
        assert_eq!(bars[0].open_time.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn unparsable_kline_is_malformed() {
        let body = r#"[[1700000000000, "abc", "101.0", "99.0", "100.5", "12.5", 1700003599999]]"#;
        let now = Utc.timestamp_millis_opt(1_800_000_000_000).unwrap();
        let err = parse_klines("BTCUSDT", body, now).unwrap_err();
        assert!(matches!(err, Error::MalformedData { .. }));
    }

    #[test]
    fn non_zero_position_amount_is_open() {
        let body = r#"[
            {"symbol": "BTCUSDT", "positionAmt": "0.000", "entryPrice": "0.0"},
            {"symbol": "ETHUSDT", "positionAmt": "-0.250", "entryPrice": "2000.0"}
        ]"#;
        assert!(!position_is_open("BTCUSDT", body).unwrap());
        assert!(position_is_open("ETHUSDT", body).unwrap());
        assert!(!position_is_open("SOLUSDT", body).unwrap());
    }
}
