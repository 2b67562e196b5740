use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;

pub const ADD_ON_SKU: &str = "SLENO-AVULSO";

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub sku: &'static str,
    pub name: &'static str,
    pub cards: u32,
    pub price_cents: i64,
    /// Provider bundle backing this plan's hosted checkout page.
    pub bundle_id: Option<u64>,
    pub is_plan: bool,
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        sku: "SLENO-STARTER",
        name: "Starter",
        cards: 1,
        price_cents: 8900,
        bundle_id: Some(1),
        is_plan: true,
    },
    CatalogEntry {
        sku: "SLENO-NEGOCIO",
        name: "Negócio",
        cards: 3,
        price_cents: 24900,
        bundle_id: Some(2),
        is_plan: true,
    },
    CatalogEntry {
        sku: "SLENO-EMPRESA",
        name: "Empresa",
        cards: 10,
        price_cents: 69900,
        bundle_id: Some(3),
        is_plan: true,
    },
    CatalogEntry {
        sku: ADD_ON_SKU,
        name: "Cartão avulso",
        cards: 1,
        price_cents: 7900,
        bundle_id: None,
        is_plan: false,
    },
];

impl CatalogEntry {
    pub fn price(&self) -> BigDecimal {
        BigDecimal::new(self.price_cents.into(), 2)
    }

    pub fn total(&self, quantity: u32) -> BigDecimal {
        self.price() * BigDecimal::from(quantity)
    }
}

pub fn find(sku: &str) -> Option<&'static CatalogEntry> {
    let sku = sku.trim();
    CATALOG.iter().find(|entry| entry.sku.eq_ignore_ascii_case(sku))
}

pub fn find_plan(sku: &str) -> Option<&'static CatalogEntry> {
    find(sku).filter(|entry| entry.is_plan)
}

pub fn bundle_for_sku(sku: &str) -> Option<u64> {
    find_plan(sku).and_then(|entry| entry.bundle_id)
}

/// The provider takes money as plain JSON numbers.
pub fn to_provider_amount(amount: &BigDecimal) -> f64 {
    amount.round(2).to_f64().unwrap_or_default()
}
