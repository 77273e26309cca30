use async_trait::async_trait;
use rust_decimal::Decimal;

/// Charge handle returned by the payment provider.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub external_id: String,
    pub payment_url: Option<String>,
    pub account_number: Option<String>,
}

/// External payment collaborator. The real provider SDK lives behind this
/// trait; the default wiring uses [`MockGateway`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(
        &self,
        order_number: &str,
        amount: Decimal,
        email: &str,
        name: &str,
    ) -> anyhow::Result<GatewayCharge>;

    async fn create_virtual_account(
        &self,
        order_number: &str,
        amount: Decimal,
        bank_code: &str,
        name: &str,
    ) -> anyhow::Result<GatewayCharge>;
}

/// Offline stand-in used when no provider credentials are configured.
/// External ids are deterministic so the webhook flow can be exercised
/// end to end in tests.
#[derive(Debug, Default)]
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_invoice(
        &self,
        order_number: &str,
        amount: Decimal,
        email: &str,
        _name: &str,
    ) -> anyhow::Result<GatewayCharge> {
        let external_id = format!("mock-inv-{order_number}");
        tracing::debug!(%external_id, %amount, email, "mock invoice created");
        Ok(GatewayCharge {
            payment_url: Some(format!("https://pay.invalid/invoice/{external_id}")),
            account_number: None,
            external_id,
        })
    }

    async fn create_virtual_account(
        &self,
        order_number: &str,
        amount: Decimal,
        bank_code: &str,
        _name: &str,
    ) -> anyhow::Result<GatewayCharge> {
        let external_id = format!("mock-va-{bank_code}-{order_number}");
        tracing::debug!(%external_id, %amount, "mock virtual account created");
        Ok(GatewayCharge {
            payment_url: None,
            account_number: Some(format!("988{}", order_number.len() * 7919)),
            external_id,
        })
    }
}
