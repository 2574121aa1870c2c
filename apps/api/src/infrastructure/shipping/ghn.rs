//! Giao Hàng Nhanh (GHN) public API client.
//!
//! Every response is wrapped in `{ "code": 200, "message": "Success", "data": ... }`;
//! any other code is reported as a provider error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{District, FeeRequest, Province, ShippingError, ShippingProvider, Ward};
use crate::config::GhnConfig;

/// GHN "standard" delivery service
const SERVICE_TYPE_STANDARD: i32 = 2;

/// Upper bound for one GHN call, connect included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i32,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct FeeBody<'a> {
    service_type_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_district_id: Option<i32>,
    to_district_id: i32,
    to_ward_code: &'a str,
    weight: u32,
    insurance_value: i64,
}

#[derive(Debug, Deserialize)]
struct FeeData {
    total: i64,
}

/// HTTP client for GHN
#[derive(Clone)]
pub struct GhnClient {
    client: Client,
    config: GhnConfig,
}

impl std::fmt::Debug for GhnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhnClient")
            .field("api_url", &self.config.api_url)
            .field("shop_id", &self.config.shop_id)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl GhnClient {
    pub fn new(config: GhnConfig) -> Result<Self, ShippingError> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    /// Client whose calls fail with [`ShippingError::Request`] after `timeout`
    pub fn with_timeout(config: GhnConfig, timeout: Duration) -> Result<Self, ShippingError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ShippingError::Request(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ShippingError> {
        let request = self
            .client
            .get(self.url(path))
            .header("Token", &self.config.token)
            .query(query);
        self.send(path, request).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ShippingError> {
        let request = self
            .client
            .post(self.url(path))
            .header("Token", &self.config.token)
            .header("ShopId", &self.config.shop_id)
            .json(body);
        self.send(path, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, ShippingError> {
        let response = request
            .send()
            .await
            .map_err(|e| ShippingError::Request(e.to_string()))?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ShippingError::Request(e.to_string()))?;

        if envelope.code != 200 {
            error!(path, code = envelope.code, message = %envelope.message, "GHN request failed");
            return Err(ShippingError::Provider(envelope.message));
        }

        debug!(path, "GHN request succeeded");
        Ok(envelope.data)
    }
}

#[async_trait]
impl ShippingProvider for GhnClient {
    #[instrument(skip(self))]
    async fn provinces(&self) -> Result<Vec<Province>, ShippingError> {
        Ok(self
            .get("/master-data/province", &[])
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn districts(&self, province_id: i32) -> Result<Vec<District>, ShippingError> {
        Ok(self
            .get(
                "/master-data/district",
                &[("province_id", province_id.to_string())],
            )
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn wards(&self, district_id: i32) -> Result<Vec<Ward>, ShippingError> {
        // `data: null` for districts without wards
        Ok(self
            .get(
                "/master-data/ward",
                &[("district_id", district_id.to_string())],
            )
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn fee(&self, request: &FeeRequest) -> Result<Decimal, ShippingError> {
        let insurance_value = request.insurance_value.trunc().to_i64().unwrap_or(0).max(0);
        let body = FeeBody {
            service_type_id: SERVICE_TYPE_STANDARD,
            from_district_id: self.config.from_district_id,
            to_district_id: request.to_district_id,
            to_ward_code: &request.to_ward_code,
            weight: request.weight,
            insurance_value,
        };

        let data: FeeData = self
            .post("/v2/shipping-order/fee", &body)
            .await?
            .ok_or_else(|| ShippingError::Provider("GHN returned no fee".to_string()))?;
        Ok(Decimal::from(data.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_data() {
        let json = r#"{"code":200,"message":"Success","data":{"total":36300,"service_fee":36300}}"#;
        let envelope: Envelope<FeeData> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.data.unwrap().total, 36300);
    }

    #[test]
    fn envelope_with_error_code() {
        let json = r#"{"code":400,"message":"Token is not valid","data":null}"#;
        let envelope: Envelope<Vec<Province>> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 400);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn fee_body_uses_ghn_field_names() {
        let body = FeeBody {
            service_type_id: SERVICE_TYPE_STANDARD,
            from_district_id: None,
            to_district_id: 1442,
            to_ward_code: "20109",
            weight: 500,
            insurance_value: 150_000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["service_type_id"], 2);
        assert_eq!(json["to_ward_code"], "20109");
        assert!(json.get("from_district_id").is_none());
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = GhnClient::new(GhnConfig {
            token: "t".into(),
            shop_id: "1".into(),
            api_url: "https://dev-online-gateway.ghn.vn/shiip/public-api/".into(),
            from_district_id: None,
        })
        .unwrap();
        assert_eq!(
            client.url("/master-data/province"),
            "https://dev-online-gateway.ghn.vn/shiip/public-api/master-data/province"
        );
    }

    #[tokio::test]
    async fn unresponsive_gateway_times_out() {
        // accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _held = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let client = GhnClient::with_timeout(
            GhnConfig {
                token: "t".into(),
                shop_id: "1".into(),
                api_url: format!("http://{}", addr),
                from_district_id: None,
            },
            Duration::from_millis(200),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = client.provinces().await.unwrap_err();
        assert!(matches!(err, ShippingError::Request(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
