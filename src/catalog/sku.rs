//! Billing SKUs
//!
//! SKU model as returned by the Cloud Billing catalog, plus the two pure
//! pricing helpers used by the cost estimator: keyword/region matching and
//! monthly cost derivation.

use serde::{Deserialize, Deserializer, Serialize};

/// Hours in a billing month (365 * 24 / 12)
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Currency used for all estimates
pub const DEFAULT_CURRENCY: &str = "USD";

/// A Money value (units + nanos)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    #[serde(default)]
    pub currency_code: String,
    /// int64 on the wire, encoded as a JSON string by the API
    #[serde(default, deserialize_with = "int64_lenient")]
    pub units: i64,
    #[serde(default)]
    pub nanos: i64,
}

impl Money {
    pub fn from_amount(currency_code: &str, amount: f64) -> Self {
        let units = amount.trunc();
        Self {
            currency_code: currency_code.to_string(),
            units: units as i64,
            nanos: ((amount - units) * 1_000_000_000.0).round() as i64,
        }
    }

    pub fn amount(&self) -> f64 {
        self.units as f64 + (self.nanos as f64 / 1_000_000_000.0)
    }
}

fn int64_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRate {
    #[serde(default)]
    pub start_usage_amount: f64,
    #[serde(default)]
    pub unit_price: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingExpression {
    #[serde(default)]
    pub usage_unit: String,
    #[serde(default)]
    pub usage_unit_description: String,
    #[serde(default)]
    pub tiered_rates: Vec<TierRate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingInfo {
    #[serde(default)]
    pub pricing_expression: Option<PricingExpression>,
}

/// A billing catalog line item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    #[serde(default)]
    pub sku_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub service_regions: Vec<String>,
    #[serde(default)]
    pub pricing_info: Vec<PricingInfo>,
}

impl Sku {
    /// Single-tier SKU, mostly useful for snapshots and tests
    pub fn new(description: &str, regions: &[&str], usage_unit_description: &str, price: f64) -> Self {
        Self {
            sku_id: String::new(),
            description: description.to_string(),
            service_regions: regions.iter().map(|r| r.to_string()).collect(),
            pricing_info: vec![PricingInfo {
                pricing_expression: Some(PricingExpression {
                    usage_unit: String::new(),
                    usage_unit_description: usage_unit_description.to_string(),
                    tiered_rates: vec![TierRate {
                        start_usage_amount: 0.0,
                        unit_price: Some(Money::from_amount(DEFAULT_CURRENCY, price)),
                    }],
                }),
            }],
        }
    }

    /// First tiered unit price in `currency`, 0 when none is present
    pub fn unit_price(&self, currency: &str) -> f64 {
        self.pricing_info
            .iter()
            .filter_map(|info| info.pricing_expression.as_ref())
            .flat_map(|expr| expr.tiered_rates.iter())
            .filter_map(|tier| tier.unit_price.as_ref())
            .find(|price| price.currency_code == currency)
            .map(Money::amount)
            .unwrap_or(0.0)
    }

    /// Usage unit of the first pricing entry, lower-cased
    pub fn usage_unit_description(&self) -> Option<String> {
        self.pricing_info
            .first()
            .and_then(|info| info.pricing_expression.as_ref())
            .map(|expr| expr.usage_unit_description.to_lowercase())
    }

    pub fn is_offered_in(&self, region: &str) -> bool {
        self.service_regions.iter().any(|r| r == region)
    }

    /// Optional listing filter: case-insensitive description substring
    pub fn matches_filter(&self, filter: Option<&str>) -> bool {
        filter.map_or(true, |f| self.matches_keywords(&[f]))
    }

    /// Case-insensitive "all keywords appear in the description"
    pub fn matches_keywords(&self, keywords: &[&str]) -> bool {
        let description = self.description.to_lowercase();
        keywords
            .iter()
            .all(|k| description.contains(&k.to_lowercase()))
    }
}

/// First SKU offered in `region` whose description contains every keyword.
/// Catalog order decides between several candidates; prices are not compared.
pub fn find_sku<'a>(skus: &'a [Sku], keywords: &[&str], region: &str) -> Option<&'a Sku> {
    skus.iter()
        .find(|sku| sku.is_offered_in(region) && sku.matches_keywords(keywords))
}

/// Monthly cost of `usage_amount` units of a SKU.
///
/// Hourly units are scaled by [`HOURS_PER_MONTH`]; capacity units
/// (gibibyte/gb per month) are already monthly.
pub fn monthly_cost(sku: &Sku, usage_amount: f64) -> f64 {
    let price = sku.unit_price(DEFAULT_CURRENCY);
    if price == 0.0 {
        return 0.0;
    }

    match sku.usage_unit_description() {
        Some(unit) if unit.contains("hour") => price * usage_amount * HOURS_PER_MONTH,
        Some(unit) if unit.contains("gibibyte") || unit.contains("gb") => price * usage_amount,
        _ => price * usage_amount,
    }
}
