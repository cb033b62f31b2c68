use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::GatewayConfig;
use crate::errors::ServiceError;

use super::{CreateIntentRequest, PayerInfo, PaymentGateway, PaymentIntent};

/// HTTP client for a Mercado-Pago-shaped PIX payment API.
///
/// Every call carries a hard timeout; a transport failure or timeout maps to
/// `GatewayUnavailable`, a non-success response to `GatewayRejected` (with
/// 5xx/429 kept retryable as `GatewayUnavailable`).
#[derive(Clone)]
pub struct PixGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    payment_method_id: String,
}

impl PixGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::GatewayUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            payment_method_id: config.payment_method_id.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "gateway returned non-success status");
            return Err(classify_http_failure(status, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::GatewayUnavailable(format!("malformed response: {e}")))
    }
}

fn classify_http_failure(status: StatusCode, body: &str) -> ServiceError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ServiceError::GatewayUnavailable(format!("status {status}"))
    } else {
        ServiceError::GatewayRejected(format!("status {status}: {body}"))
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    ServiceError::GatewayUnavailable(e.to_string())
}

#[derive(Debug, Serialize)]
struct PaymentRequestBody {
    #[serde(with = "rust_decimal::serde::float")]
    transaction_amount: Decimal,
    description: String,
    payment_method_id: String,
    payer: PayerBody,
    external_reference: String,
}

#[derive(Debug, Serialize)]
struct PayerBody {
    email: String,
    first_name: String,
}

impl From<PayerInfo> for PayerBody {
    fn from(payer: PayerInfo) -> Self {
        Self {
            email: payer.email,
            first_name: payer.first_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentBody {
    id: serde_json::Number,
    status: String,
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    results: Vec<PaymentBody>,
}

impl From<PaymentBody> for PaymentIntent {
    fn from(body: PaymentBody) -> Self {
        PaymentIntent {
            id: body.id.to_string(),
            status: body.status,
            qr_code: body
                .point_of_interaction
                .and_then(|poi| poi.transaction_data)
                .and_then(|data| data.qr_code),
        }
    }
}

#[async_trait]
impl PaymentGateway for PixGateway {
    #[instrument(skip(self, request), fields(external_reference = %request.external_reference))]
    async fn create_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        let body = PaymentRequestBody {
            transaction_amount: request.amount,
            description: request.description,
            payment_method_id: self.payment_method_id.clone(),
            payer: request.payer.into(),
            external_reference: request.external_reference,
        };

        let response = self
            .client
            .post(self.url("/v1/payments"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let payment: PaymentBody = Self::decode(response).await?;
        let intent = PaymentIntent::from(payment);
        info!(intent_id = %intent.id, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn find_by_external_reference(
        &self,
        external_reference: &str,
    ) -> Result<Option<PaymentIntent>, ServiceError> {
        let response = self
            .client
            .get(self.url("/v1/payments/search"))
            .bearer_auth(&self.access_token)
            .query(&[("external_reference", external_reference)])
            .send()
            .await
            .map_err(transport_error)?;

        let search: SearchBody = Self::decode(response).await?;
        Ok(search.results.into_iter().next().map(PaymentIntent::from))
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/payments/{intent_id}")))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let payment: PaymentBody = Self::decode(response).await?;
        Ok(PaymentIntent::from(payment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_stay_retryable() {
        assert!(matches!(
            classify_http_failure(StatusCode::INTERNAL_SERVER_ERROR, ""),
            ServiceError::GatewayUnavailable(_)
        ));
        assert!(matches!(
            classify_http_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            ServiceError::GatewayUnavailable(_)
        ));
    }

    #[test]
    fn client_errors_reject_the_attempt() {
        assert!(matches!(
            classify_http_failure(StatusCode::BAD_REQUEST, "invalid payer"),
            ServiceError::GatewayRejected(_)
        ));
        assert!(matches!(
            classify_http_failure(StatusCode::NOT_FOUND, ""),
            ServiceError::GatewayRejected(_)
        ));
    }

    #[test]
    fn payment_body_maps_to_intent() {
        let body: PaymentBody = serde_json::from_str(
            r#"{
                "id": 123456789,
                "status": "pending",
                "point_of_interaction": {
                    "transaction_data": {"qr_code": "00020126pix..."}
                }
            }"#,
        )
        .unwrap();
        let intent = PaymentIntent::from(body);
        assert_eq!(intent.id, "123456789");
        assert_eq!(intent.qr_code.as_deref(), Some("00020126pix..."));
    }
}
