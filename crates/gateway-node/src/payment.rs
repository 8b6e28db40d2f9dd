use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the admission gate asks a configured payment processor to price a
/// request at, per §4.6 step 4.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    pub content_size: u64,
    pub protocol: String,
    pub host: String,
    pub original_url: String,
    pub content_type: Option<String>,
}

/// Computed price for a request, returned to the client on a 402 and
/// echoed back in the settlement flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirements {
    pub amount: String,
    pub asset: String,
    pub pay_to: String,
    pub content_size: u64,
}

/// Opaque settlement receipt, rendered into the `X-Payment-Response`
/// header on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub receipt: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment token failed verification")]
    InvalidToken,
    #[error("settlement failed: {0}")]
    SettlementFailed(String),
}

/// External collaborator: the x402 micropayment protocol implementation.
/// The admission gate calls this only when a processor is configured; its
/// absence means the gateway never requires payment, only rate limiting.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Computes what a request of this shape costs.
    fn requirements(&self, ctx: &PaymentContext) -> PaymentRequirements;

    /// Verifies an `X-Payment` token against previously computed
    /// requirements.
    async fn verify(
        &self,
        token: &str,
        requirements: &PaymentRequirements,
    ) -> Result<(), PaymentError>;

    /// Settles a verified payment, returning the receipt for
    /// `X-Payment-Response`.
    async fn settle(&self, token: &str) -> Result<PaymentReceipt, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysAccepts;

    #[async_trait]
    impl PaymentProcessor for AlwaysAccepts {
        fn requirements(&self, ctx: &PaymentContext) -> PaymentRequirements {
            PaymentRequirements {
                amount: (ctx.content_size / 1024).max(1).to_string(),
                asset: "test-asset".to_string(),
                pay_to: "test-address".to_string(),
                content_size: ctx.content_size,
            }
        }

        async fn verify(
            &self,
            token: &str,
            _requirements: &PaymentRequirements,
        ) -> Result<(), PaymentError> {
            if token.is_empty() {
                return Err(PaymentError::InvalidToken);
            }
            Ok(())
        }

        async fn settle(&self, _token: &str) -> Result<PaymentReceipt, PaymentError> {
            Ok(PaymentReceipt {
                receipt: "receipt-1".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn verify_rejects_empty_token() {
        let processor = AlwaysAccepts;
        let requirements = processor.requirements(&PaymentContext {
            content_size: 2048,
            protocol: "https".to_string(),
            host: "gateway.example".to_string(),
            original_url: "/abc".to_string(),
            content_type: None,
        });
        assert_eq!(requirements.amount, "2");
        assert!(processor.verify("", &requirements).await.is_err());
        assert!(processor.verify("tok", &requirements).await.is_ok());
    }
}
