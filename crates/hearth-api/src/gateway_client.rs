//! HTTP client for the two third-party payment gateways. Both are treated
//! as black boxes: initiate returns a redirect URL where the donor completes
//! payment, verify confirms the final status by transaction reference.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use hearth_types::models::{PaymentProvider, PaymentStatus};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway answered but declined; carries its own message.
    #[error("{0}")]
    Declined(String),

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed gateway response: {0}")]
    Malformed(&'static str),
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub paystack_secret: String,
    pub paystack_base: String,
    pub flutterwave_secret: String,
    pub flutterwave_base: String,
    /// Where the gateway redirects the donor after checkout.
    pub callback_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            paystack_secret: std::env::var("PAYSTACK_SECRET_KEY").unwrap_or_default(),
            paystack_base: std::env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".into()),
            flutterwave_secret: std::env::var("FLUTTERWAVE_SECRET_KEY").unwrap_or_default(),
            flutterwave_base: std::env::var("FLUTTERWAVE_BASE_URL")
                .unwrap_or_else(|_| "https://api.flutterwave.com/v3".into()),
            callback_url: std::env::var("HEARTH_PAYMENT_CALLBACK_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payments/complete".into()),
        }
    }
}

pub struct ChargeRequest<'a> {
    pub email: &'a str,
    /// Minor currency units.
    pub amount: i64,
    pub currency: &'a str,
    pub reference: &'a str,
    pub description: Option<&'a str>,
}

pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

// -- Paystack wire shapes --

#[derive(Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct PaystackInitData {
    authorization_url: String,
}

#[derive(Deserialize)]
struct PaystackVerifyData {
    status: String,
}

// -- Flutterwave wire shapes --

#[derive(Deserialize)]
struct FlutterwaveEnvelope<T> {
    status: String,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct FlutterwaveInitData {
    link: String,
}

#[derive(Deserialize)]
struct FlutterwaveVerifyData {
    status: String,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Start a checkout. Returns the redirect URL the donor completes
    /// payment at.
    pub async fn initiate(
        &self,
        provider: PaymentProvider,
        req: &ChargeRequest<'_>,
    ) -> Result<String, GatewayError> {
        match provider {
            PaymentProvider::Paystack => self.paystack_initiate(req).await,
            PaymentProvider::Flutterwave => self.flutterwave_initiate(req).await,
        }
    }

    /// Confirm the final status of a charge by its reference. `Pending`
    /// means the gateway has not settled yet and the stored status should
    /// not be flipped.
    pub async fn verify(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<PaymentStatus, GatewayError> {
        match provider {
            PaymentProvider::Paystack => self.paystack_verify(reference).await,
            PaymentProvider::Flutterwave => self.flutterwave_verify(reference).await,
        }
    }

    async fn paystack_initiate(&self, req: &ChargeRequest<'_>) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "email": req.email,
            "amount": req.amount,
            "currency": req.currency,
            "reference": req.reference,
            "callback_url": self.config.callback_url,
            "metadata": { "description": req.description },
        });

        let resp: PaystackEnvelope<PaystackInitData> = self
            .http
            .post(format!("{}/transaction/initialize", self.config.paystack_base))
            .bearer_auth(&self.config.paystack_secret)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !resp.status {
            return Err(GatewayError::Declined(
                resp.message.unwrap_or_else(|| "payment initiation declined".into()),
            ));
        }
        resp.data
            .map(|d| d.authorization_url)
            .ok_or(GatewayError::Malformed("missing authorization_url"))
    }

    async fn paystack_verify(&self, reference: &str) -> Result<PaymentStatus, GatewayError> {
        let resp: PaystackEnvelope<PaystackVerifyData> = self
            .http
            .get(format!(
                "{}/transaction/verify/{}",
                self.config.paystack_base, reference
            ))
            .bearer_auth(&self.config.paystack_secret)
            .send()
            .await?
            .json()
            .await?;

        if !resp.status {
            return Err(GatewayError::Declined(
                resp.message.unwrap_or_else(|| "verification declined".into()),
            ));
        }
        let data = resp.data.ok_or(GatewayError::Malformed("missing data"))?;
        Ok(match data.status.as_str() {
            "success" => PaymentStatus::Successful,
            "failed" | "abandoned" | "reversed" => PaymentStatus::Failed,
            other => {
                warn!("Paystack verify returned non-final status '{}'", other);
                PaymentStatus::Pending
            }
        })
    }

    async fn flutterwave_initiate(&self, req: &ChargeRequest<'_>) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "tx_ref": req.reference,
            "amount": req.amount,
            "currency": req.currency,
            "redirect_url": self.config.callback_url,
            "customer": { "email": req.email },
            "customizations": { "description": req.description },
        });

        let resp: FlutterwaveEnvelope<FlutterwaveInitData> = self
            .http
            .post(format!("{}/payments", self.config.flutterwave_base))
            .bearer_auth(&self.config.flutterwave_secret)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if resp.status != "success" {
            return Err(GatewayError::Declined(
                resp.message.unwrap_or_else(|| "payment initiation declined".into()),
            ));
        }
        resp.data
            .map(|d| d.link)
            .ok_or(GatewayError::Malformed("missing payment link"))
    }

    async fn flutterwave_verify(&self, reference: &str) -> Result<PaymentStatus, GatewayError> {
        let resp: FlutterwaveEnvelope<FlutterwaveVerifyData> = self
            .http
            .get(format!(
                "{}/transactions/verify_by_reference",
                self.config.flutterwave_base
            ))
            .query(&[("tx_ref", reference)])
            .bearer_auth(&self.config.flutterwave_secret)
            .send()
            .await?
            .json()
            .await?;

        if resp.status != "success" {
            return Err(GatewayError::Declined(
                resp.message.unwrap_or_else(|| "verification declined".into()),
            ));
        }
        let data = resp.data.ok_or(GatewayError::Malformed("missing data"))?;
        Ok(match data.status.as_str() {
            "successful" => PaymentStatus::Successful,
            "failed" => PaymentStatus::Failed,
            other => {
                warn!("Flutterwave verify returned non-final status '{}'", other);
                PaymentStatus::Pending
            }
        })
    }
}
