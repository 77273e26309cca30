use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Payment;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVirtualAccountRequest {
    pub order_id: Uuid,
    pub bank_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentCharge {
    pub payment: Payment,
    pub payment_url: Option<String>,
    pub account_number: Option<String>,
}

/// Raw provider callback. Unknown fields land in the opaque remainder and are
/// stored as payment metadata.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct WebhookPayload {
    pub external_id: String,
    pub status: String,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
