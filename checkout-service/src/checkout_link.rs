use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

/// Everything an extractor may look at when hunting for a checkout URL.
pub struct LinkContext<'a> {
    pub order: &'a Value,
    pub customer: Option<&'a Value>,
    pub bundle_id: Option<u64>,
}

pub trait LinkExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, ctx: &LinkContext<'_>) -> Option<String>;
}

/// First non-empty `bundles[i].link_to_checkout` of the order response.
pub struct BundleLink;

impl LinkExtractor for BundleLink {
    fn name(&self) -> &'static str {
        "bundle_link"
    }

    fn extract(&self, ctx: &LinkContext<'_>) -> Option<String> {
        ["/data/bundles", "/bundles"]
            .iter()
            .filter_map(|pointer| ctx.order.pointer(pointer))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|bundle| bundle.get("link_to_checkout"))
            .filter_map(Value::as_str)
            .find(|link| !link.trim().is_empty())
            .map(str::to_string)
    }
}

/// `<base>/<bundle_id>?customer_hash=<hash>` when both pieces are known.
pub struct CustomerHashTemplate {
    base: Url,
}

impl CustomerHashTemplate {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    fn customer_hash<'a>(ctx: &LinkContext<'a>) -> Option<&'a str> {
        let from_order = ["/data/customer/hash", "/data/customer_hash", "/customer_hash"]
            .iter()
            .filter_map(|pointer| ctx.order.pointer(pointer));
        let from_customer = ["/data/hash", "/hash"]
            .iter()
            .filter_map(|pointer| ctx.customer.and_then(|c| c.pointer(pointer)));

        from_order
            .chain(from_customer)
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|hash| !hash.is_empty())
    }
}

impl LinkExtractor for CustomerHashTemplate {
    fn name(&self) -> &'static str {
        "customer_hash_template"
    }

    fn extract(&self, ctx: &LinkContext<'_>) -> Option<String> {
        let bundle_id = ctx.bundle_id?;
        let hash = Self::customer_hash(ctx)?;

        let mut url = self.base.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(&bundle_id.to_string());
        url.query_pairs_mut().append_pair("customer_hash", hash);
        Some(url.into())
    }
}

/// Ordered extractor chain, first hit wins. An empty string means no
/// checkout page could be derived and the caller has to handle it.
pub struct CheckoutLinkResolver {
    extractors: Vec<Box<dyn LinkExtractor>>,
}

impl CheckoutLinkResolver {
    pub fn new(checkout_base: Url) -> Self {
        Self::with_extractors(vec![
            Box::new(BundleLink),
            Box::new(CustomerHashTemplate::new(checkout_base)),
        ])
    }

    pub fn with_extractors(extractors: Vec<Box<dyn LinkExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn resolve(&self, ctx: &LinkContext<'_>) -> String {
        for extractor in &self.extractors {
            if let Some(link) = extractor.extract(ctx) {
                debug!("Checkout link resolved by {}", extractor.name());
                return link;
            }
        }

        warn!(bundle_id = ?ctx.bundle_id, "Checkout link unavailable for provider response");
        String::new()
    }
}

/// Bundle id of the first product in an order response that is a known plan.
pub fn bundle_id_from_order(order: &Value) -> Option<u64> {
    ["/data/products", "/products"]
        .iter()
        .filter_map(|pointer| order.pointer(pointer))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|product| product.get("sku").and_then(Value::as_str))
        .find_map(shared::catalog::bundle_for_sku)
}
