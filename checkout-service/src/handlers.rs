use bigdecimal::BigDecimal;
use serde_json::Value;
use shared::catalog::{self, CatalogEntry, ADD_ON_SKU};
use shared::TransactionRecord;
use std::sync::Arc;
use tracing::{info, warn};
use crate::appmax::AppmaxApi;
use crate::checkout_link::{bundle_id_from_order, CheckoutLinkResolver, LinkContext};
use crate::error::GatewayError;
use crate::models::*;
use crate::store::TransactionStore;

type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub transaction_id: i64,
    pub customer_id: u64,
    pub order_id: Option<u64>,
    pub checkout_url: String,
}

/// Drives one order submission through the provider: customer first, then
/// the order, then the local record. Provider calls are never retried since
/// neither endpoint deduplicates.
pub struct OrderGateway {
    appmax: Arc<dyn AppmaxApi>,
    store: Arc<TransactionStore>,
    links: Arc<CheckoutLinkResolver>,
}

impl OrderGateway {
    pub fn new(appmax: Arc<dyn AppmaxApi>, store: Arc<TransactionStore>, links: Arc<CheckoutLinkResolver>) -> Self {
        Self { appmax, store, links }
    }

    pub async fn place_order(&self, request: OrderRequest) -> Result<PlacedOrder> {
        let customer = self
            .appmax
            .create_customer(request.customer_payload())
            .await
            .map_err(GatewayError::RemoteCustomerCreation)?;

        let customer_id = customer_id_from(&customer).ok_or(GatewayError::MissingCustomerId)?;
        info!("Provider customer {} created for {}", customer_id, request.email.trim());

        if request.loja_pesquisada.as_ref().map_or(true, |store| store.is_blank()) {
            return Err(GatewayError::MissingStoreSelection);
        }

        let plan = catalog::find_plan(&request.plan_sku)
            .ok_or_else(|| GatewayError::InvalidSku(request.plan_sku.clone()))?;
        let (products, total) = product_lines(plan, request.additional_cards)?;

        let order = self
            .appmax
            .create_order(order_payload(customer_id, &products, catalog::to_provider_amount(&total)))
            .await
            .map_err(GatewayError::RemoteOrderCreation)?;

        let order_id = order_id_from(&order);
        match order_id {
            Some(id) => info!("Provider order {} created for customer {}", id, customer_id),
            None => warn!("Order response for customer {} carried no order id, keeping record provisional", customer_id),
        }

        let record = self
            .store
            .append(TransactionRecord::new(customer_id, order_id, request.user_snapshot()))
            .await?;

        let checkout_url = self.links.resolve(&LinkContext {
            order: &order,
            customer: Some(&customer),
            bundle_id: plan.bundle_id,
        });

        Ok(PlacedOrder {
            transaction_id: record.id,
            customer_id,
            order_id,
            checkout_url,
        })
    }

    /// Looks the order up again at the provider and derives its checkout page.
    pub async fn checkout_link(&self, order_id: u64) -> Result<String> {
        let order = self.appmax.get_order(order_id).await?;
        Ok(self.links.resolve(&LinkContext {
            order: &order,
            customer: None,
            bundle_id: bundle_id_from_order(&order),
        }))
    }

    pub async fn fetch_order(&self, order_id: u64) -> Result<Value> {
        Ok(self.appmax.get_order(order_id).await?)
    }
}

fn product_lines(plan: &CatalogEntry, additional_cards: u32) -> Result<(Vec<ProductLine>, BigDecimal)> {
    let mut lines = vec![line(plan, 1)];
    let mut total = plan.total(1);

    if additional_cards > 0 {
        let add_on = catalog::find(ADD_ON_SKU).ok_or_else(|| GatewayError::InvalidSku(ADD_ON_SKU.to_string()))?;
        lines.push(line(add_on, additional_cards));
        total += add_on.total(additional_cards);
    }
    Ok((lines, total))
}

fn line(entry: &CatalogEntry, qty: u32) -> ProductLine {
    ProductLine {
        sku: entry.sku.to_string(),
        name: entry.name.to_string(),
        qty,
        price: catalog::to_provider_amount(&entry.price()),
    }
}
