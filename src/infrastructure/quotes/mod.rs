// src/infrastructure/quotes/mod.rs
// HTTP quote source: fetches current price snapshots from a REST
// market-data provider.

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use hyper_tls::HttpsConnector;
use serde::Deserialize;

use crate::domain::errors::{QuoteError, QuoteResult};
use crate::domain::models::Quote;
use crate::domain::repository::QuoteSource;

/// Quote payload returned by the provider.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteDto {
    price: rust_decimal::Decimal,
    #[serde(default)]
    open: Option<rust_decimal::Decimal>,
    #[serde(default)]
    high: Option<rust_decimal::Decimal>,
    #[serde(default)]
    low: Option<rust_decimal::Decimal>,
    #[serde(default)]
    previous_close: Option<rust_decimal::Decimal>,
    #[serde(default)]
    volume: u64,
}

impl From<QuoteDto> for Quote {
    fn from(dto: QuoteDto) -> Self {
        Quote {
            price: dto.price,
            open: dto.open.unwrap_or(dto.price),
            high: dto.high.unwrap_or(dto.price),
            low: dto.low.unwrap_or(dto.price),
            previous_close: dto.previous_close.unwrap_or(dto.price),
            volume: dto.volume,
        }
    }
}

pub struct HttpQuoteSource {
    client: Client<HttpsConnector<HttpConnector>>,
    base_url: String,
}

fn quote_url(base_url: &str, symbol: &str, exchange: &str) -> String {
    format!(
        "{}/quote?symbol={}&exchange={}",
        base_url,
        urlencoding::encode(symbol),
        urlencoding::encode(exchange)
    )
}

impl HttpQuoteSource {
    pub fn new(base_url: &str) -> Self {
        let https = HttpsConnector::new();
        Self {
            client: Client::builder().build::<_, Body>(https),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn get_quote(&self, symbol: &str, exchange: &str) -> QuoteResult<Quote> {
        let uri: Uri = quote_url(&self.base_url, symbol, exchange)
            .parse()
            .map_err(|e| QuoteError::Unavailable(format!("invalid quote URL: {}", e)))?;

        let response = self
            .client
            .get(uri)
            .await
            .map_err(|e| QuoteError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(QuoteError::Unavailable(format!(
                "provider returned {} for {} on {}",
                response.status(),
                symbol,
                exchange
            )));
        }

        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| QuoteError::Unavailable(e.to_string()))?;
        let dto: QuoteDto =
            serde_json::from_slice(&body).map_err(|e| QuoteError::Malformed(e.to_string()))?;

        Ok(dto.into())
    }
}
