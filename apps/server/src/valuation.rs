//! HTTP clients for the valuation service.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use tidemark_core::capture::{ActiveAccountSupplier, ValuationSource};
use tidemark_core::errors::{Error, Result};
use tidemark_core::Valuation;

/// Decimal as sent over the wire: either a JSON string or a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireDecimal {
    Text(String),
    Number(serde_json::Number),
}

impl WireDecimal {
    fn parse(&self) -> std::result::Result<Decimal, rust_decimal::Error> {
        let raw = match self {
            WireDecimal::Text(text) => text.trim().to_string(),
            WireDecimal::Number(number) => number.to_string(),
        };
        Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValuationBody {
    value: WireDecimal,
    buying_power: WireDecimal,
}

/// `GET {base}/accounts/{id}/valuation` -> `{"value": .., "buyingPower": ..}`.
pub struct HttpValuationSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpValuationSource {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ValuationSource for HttpValuationSource {
    async fn valuate(&self, account_id: &str) -> Result<Valuation> {
        let url = format!(
            "{}/accounts/{}/valuation",
            self.base_url,
            urlencoding::encode(account_id)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::valuation_unavailable(account_id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::valuation_unavailable(
                account_id,
                format!("valuation service answered {}", status),
            ));
        }

        let body: ValuationBody = response
            .json()
            .await
            .map_err(|e| Error::valuation_unavailable(account_id, e.to_string()))?;
        let value = body
            .value
            .parse()
            .map_err(|e| Error::valuation_unavailable(account_id, e.to_string()))?;
        let buying_power = body
            .buying_power
            .parse()
            .map_err(|e| Error::valuation_unavailable(account_id, e.to_string()))?;
        Ok(Valuation::new(value, buying_power))
    }
}

/// `GET {base}/accounts/active` -> `["acc-1", ...]`.
pub struct HttpActiveAccountSupplier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpActiveAccountSupplier {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ActiveAccountSupplier for HttpActiveAccountSupplier {
    async fn active_accounts(&self) -> Result<Vec<String>> {
        let url = format!("{}/accounts/active", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Unexpected(format!("active account lookup failed: {}", e)))?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| Error::Unexpected(format!("active account lookup failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    async fn valuation(Path(id): Path<String>) -> std::result::Result<Json<Value>, StatusCode> {
        match id.as_str() {
            "acc-1" => Ok(Json(json!({ "value": "1050.25", "buyingPower": "10" }))),
            "acc-num" => Ok(Json(json!({ "value": 99.5, "buyingPower": 0 }))),
            "acc-bad" => Ok(Json(json!({ "value": "n/a", "buyingPower": "0" }))),
            _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    async fn spawn_valuation_service() -> String {
        let router = Router::new()
            .route("/accounts/active", get(|| async { Json(json!(["acc-1", "acc-2"])) }))
            .route("/accounts/{id}/valuation", get(valuation));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_valuation_parses_string_and_number_decimals() {
        let base = spawn_valuation_service().await;
        let source = HttpValuationSource::new(reqwest::Client::new(), &base);

        let valuation = source.valuate("acc-1").await.unwrap();
        assert_eq!(valuation, Valuation::new(dec!(1050.25), dec!(10)));

        let valuation = source.valuate("acc-num").await.unwrap();
        assert_eq!(valuation.value, dec!(99.5));
    }

    #[tokio::test]
    async fn test_valuation_failures_are_unavailable() {
        let base = spawn_valuation_service().await;
        let source = HttpValuationSource::new(reqwest::Client::new(), &base);

        for account in ["acc-broken", "acc-bad"] {
            let err = source.valuate(account).await.unwrap_err();
            assert_eq!(err.kind(), "valuation_unavailable", "{}", account);
        }
    }

    #[tokio::test]
    async fn test_active_accounts() {
        let base = spawn_valuation_service().await;
        let supplier = HttpActiveAccountSupplier::new(reqwest::Client::new(), &base);
        assert_eq!(
            supplier.active_accounts().await.unwrap(),
            vec!["acc-1".to_string(), "acc-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unreachable_supplier_fails() {
        let supplier =
            HttpActiveAccountSupplier::new(reqwest::Client::new(), "http://127.0.0.1:1");
        assert!(supplier.active_accounts().await.is_err());
    }
}
