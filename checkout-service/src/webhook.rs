use serde_json::Value;
use shared::{provider_id, TransactionStatus};
use std::sync::Arc;
use tracing::{error, info, warn};
use crate::error::StoreError;
use crate::store::TransactionStore;

/// Integration acknowledgements that carry no payment state.
const IGNORED_EVENTS: &[&str] = &["OrderIntegrated", "CustomerCreated", "CustomerInterested"];

const EVENT_STATUSES: &[(&str, TransactionStatus)] = &[
    ("OrderPaid", TransactionStatus::Completed),
    ("OrderPaidByPix", TransactionStatus::Completed),
    ("OrderApproved", TransactionStatus::Completed),
    ("PaymentApproved", TransactionStatus::Completed),
    ("OrderAuthorized", TransactionStatus::PaymentPending),
    ("OrderAuthorizedWithDelay", TransactionStatus::PaymentPending),
    ("OrderBilletCreated", TransactionStatus::PaymentPending),
    ("OrderPixCreated", TransactionStatus::PaymentPending),
    ("PaymentPending", TransactionStatus::PaymentPending),
    ("PaymentNotAuthorized", TransactionStatus::Unauthorized),
    ("PaymentNotAuthorizedWithOrderBump", TransactionStatus::Unauthorized),
    ("OrderInFraudAnalysis", TransactionStatus::FraudReview),
    ("OrderRefusedByRisk", TransactionStatus::RiskDeclined),
    ("OrderRefund", TransactionStatus::Refunded),
    ("OrderRefunded", TransactionStatus::Refunded),
    ("ChargebackDispute", TransactionStatus::Chargeback),
    ("OrderChargeBackInTreatment", TransactionStatus::Chargeback),
    ("ChargebackWon", TransactionStatus::ChargebackRecovered),
    ("OrderPixExpired", TransactionStatus::Failed),
    ("OrderBilletOverdue", TransactionStatus::Failed),
    ("OrderCanceled", TransactionStatus::Failed),
    ("PaymentFailed", TransactionStatus::Failed),
];

/// Checked in order; the first rule with any matching needle wins.
const TEXT_RULES: &[(&[&str], TransactionStatus)] = &[
    (&["chargeback won", "chargeback_won", "chargebackwon", "chargeback recuper", "chargeback_recuper", "chargebackrecuper"], TransactionStatus::ChargebackRecovered),
    (&["chargeback"], TransactionStatus::Chargeback),
    (&["refund", "estorn"], TransactionStatus::Refunded),
    (&["fraud", "antifraude"], TransactionStatus::FraudReview),
    (&["risk", "risco"], TransactionStatus::RiskDeclined),
    (&["not authorized", "notauthorized", "not_authorized", "unauthorized", "nao autorizado", "nao_autorizado", "não autorizado"], TransactionStatus::Unauthorized),
    (&["unpaid", "not paid", "not approved", "disapproved", "nao aprovado", "não aprovado", "nao pago", "não pago"], TransactionStatus::Failed),
    (&["approved", "aprovado", "paid", "pago"], TransactionStatus::Completed),
    (&["failed", "refused", "recusado", "cancel", "expired"], TransactionStatus::Failed),
    (&["pending", "pendente"], TransactionStatus::PaymentPending),
];

pub fn is_ignored_event(event: &str) -> bool {
    IGNORED_EVENTS.iter().any(|ignored| ignored.eq_ignore_ascii_case(event.trim()))
}

/// Explicit event names take priority over free-text status matching.
pub fn map_status(event: Option<&str>, status: Option<&str>) -> Option<TransactionStatus> {
    if let Some(event) = event.map(str::trim) {
        if let Some((_, mapped)) = EVENT_STATUSES.iter().find(|(name, _)| name.eq_ignore_ascii_case(event)) {
            return Some(*mapped);
        }
    }

    [status, event]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .find_map(|text| {
            TEXT_RULES
                .iter()
                .find(|(needles, _)| needles.iter().any(|needle| text.contains(needle)))
                .map(|(_, mapped)| *mapped)
        })
}

/// The fields of a provider event the reconciler cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub event: Option<String>,
    pub order_id: Option<u64>,
    pub email: Option<String>,
    pub status: Option<String>,
}

impl WebhookEvent {
    pub fn from_payload(payload: &Value) -> Self {
        let first = |pointers: &[&str]| pointers.iter().find_map(|p| payload.pointer(p).filter(|v| !v.is_null()));

        let text = |pointers: &[&str]| {
            first(pointers)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            event: text(&["/event", "/data/event"]),
            order_id: first(&["/data/id", "/data/order_id", "/data/order/id", "/order_id"]).and_then(provider_id::coerce),
            email: text(&["/data/customer/email", "/data/email", "/email"]),
            status: text(&["/data/status", "/status"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Order id or email missing.
    Dropped,
    Ignored,
    Unmapped,
    UpdatedByOrderId(TransactionStatus),
    LinkedByEmail(TransactionStatus),
    Unmatched,
    Failed,
}

pub struct WebhookReconciler {
    store: Arc<TransactionStore>,
}

impl WebhookReconciler {
    pub fn new(store: Arc<TransactionStore>) -> Self {
        Self { store }
    }

    /// Never fails: store errors are logged and reported as `Failed`, since
    /// the provider gets its acknowledgement regardless.
    pub async fn reconcile(&self, payload: &Value) -> WebhookOutcome {
        let event = WebhookEvent::from_payload(payload);

        match self.apply(&event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to apply webhook {:?} for order {:?}: {}", event.event, event.order_id, e);
                WebhookOutcome::Failed
            }
        }
    }

    async fn apply(&self, event: &WebhookEvent) -> Result<WebhookOutcome, StoreError> {
        let (Some(order_id), Some(email)) = (event.order_id, event.email.as_deref()) else {
            warn!(event = ?event.event, "Webhook without order id or customer email, dropping");
            return Ok(WebhookOutcome::Dropped);
        };

        if event.event.as_deref().is_some_and(is_ignored_event) {
            info!("Ignoring webhook {:?} for order {}", event.event, order_id);
            return Ok(WebhookOutcome::Ignored);
        }

        let Some(status) = map_status(event.event.as_deref(), event.status.as_deref()) else {
            warn!(
                "Webhook for order {} has no recognizable status (event {:?}, status {:?})",
                order_id, event.event, event.status
            );
            return Ok(WebhookOutcome::Unmapped);
        };

        if let Some(existing) = self.store.find_by_order_id(order_id).await? {
            if existing.status.is_terminal() && existing.status != status {
                warn!("Order {} leaves terminal status {} for {}", order_id, existing.status, status);
            }
        }

        if self.store.update_status_by_order_id(order_id, status).await? {
            info!("Order {} moved to {}", order_id, status);
            return Ok(WebhookOutcome::UpdatedByOrderId(status));
        }

        if let Some(record) = self
            .store
            .update_by_email_where_order_id_null(email, order_id, status)
            .await?
        {
            info!("Transaction {} linked to order {} with status {}", record.id, order_id, status);
            return Ok(WebhookOutcome::LinkedByEmail(status));
        }

        match self.store.find_by_email(email).await? {
            Some(existing) => warn!(
                "Webhook for order {} unmatched; {} already belongs to order {:?}",
                order_id, email, existing.order_id
            ),
            None => warn!("Webhook for order {} unmatched; no transaction for {}", order_id, email),
        }
        Ok(WebhookOutcome::Unmatched)
    }
}
