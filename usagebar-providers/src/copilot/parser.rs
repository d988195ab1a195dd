//! Parsers for the GitHub billing pages behind a browser session.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use usagebar_core::{DailyUsage, ModelUsage};
use usagebar_fetch::coerce;

// ============================================================================
// Customer Id
// ============================================================================

/// Customer id patterns, tried in order. First match wins.
static CUSTOMER_ID_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""customerId":\s*(\d+)"#,
        r#""customer_id":\s*(\d+)"#,
        r"customer_id=(\d+)",
        r#"data-customer-id="(\d+)""#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid regex"))
    .collect()
});

/// Extracts the numeric billing customer id from the settings page.
pub fn extract_customer_id(html: &str) -> Option<String> {
    CUSTOMER_ID_RES
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ============================================================================
// Usage Card
// ============================================================================

/// The summary numbers from the usage card.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageCard {
    /// Premium requests billed beyond the entitlement.
    pub net_quantity: f64,
    /// Premium requests covered by the entitlement.
    pub discount_quantity: f64,
    /// Premium requests granted per period.
    pub entitlement: i64,
    /// Add-on cost accrued this period.
    pub net_billed_amount: f64,
}

impl UsageCard {
    /// Total premium requests used.
    pub fn used(&self) -> f64 {
        self.net_quantity + self.discount_quantity
    }

    /// Remaining premium requests, negative in overage.
    #[allow(clippy::cast_possible_truncation)]
    pub fn remaining(&self) -> i64 {
        self.entitlement - self.used().round() as i64
    }
}

/// Parses the usage card document.
///
/// Returns `None` when neither the entitlement nor any quantity is present.
pub fn parse_usage_card(doc: &Value) -> Option<UsageCard> {
    let net = coerce::first_number(doc, &["netQuantity", "net_quantity"]);
    let discount = coerce::first_number(doc, &["discountQuantity", "discount_quantity"]);
    let entitlement = coerce::first_i64(
        doc,
        &[
            "userPremiumRequestEntitlement",
            "user_premium_request_entitlement",
            "entitlement",
        ],
    );

    if net.is_none() && discount.is_none() && entitlement.is_none() {
        return None;
    }

    Some(UsageCard {
        net_quantity: net.unwrap_or(0.0),
        discount_quantity: discount.unwrap_or(0.0),
        entitlement: entitlement.unwrap_or(0),
        net_billed_amount: coerce::first_number(doc, &["netBilledAmount", "net_billed_amount"])
            .unwrap_or(0.0),
    })
}

// ============================================================================
// Usage Table
// ============================================================================

/// Cells a row needs: date, included, billed, gross, billed amount.
const ROW_CELLS: usize = 5;

fn cell_values(row: &Value) -> Option<Vec<&Value>> {
    let cells = row.get("cells")?.as_array()?;
    if cells.len() < ROW_CELLS {
        return None;
    }
    Some(
        cells
            .iter()
            .map(|cell| cell.get("value").unwrap_or(&Value::Null))
            .collect(),
    )
}

fn text(value: &Value, default: &str) -> String {
    coerce::string(value).unwrap_or_else(|| default.to_string())
}

fn parse_model_row(row: &Value) -> Option<ModelUsage> {
    let cells = cell_values(row)?;
    Some(ModelUsage {
        model: text(cells[0], ""),
        included_requests: coerce::number(cells[1]).unwrap_or(0.0),
        billed_requests: coerce::number(cells[2]).unwrap_or(0.0),
        gross_amount: text(cells[3], "$0"),
        cost: text(cells[4], "$0"),
    })
}

/// Parses one page of the usage table into daily rows.
///
/// Rows with fewer than five cells are skipped.
pub fn parse_usage_table(doc: &Value) -> Vec<DailyUsage> {
    let Some(rows) = doc
        .get("table")
        .and_then(|t| t.get("rows"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    rows.iter()
        .filter_map(|row| {
            let cells = cell_values(row)?;
            let models = row
                .get("subtable")
                .and_then(|s| s.get("rows"))
                .and_then(Value::as_array)
                .map(|rows| rows.iter().filter_map(parse_model_row).collect())
                .unwrap_or_default();

            Some(DailyUsage {
                date: text(cells[0], ""),
                included_requests: coerce::number(cells[1]).unwrap_or(0.0),
                billed_requests: coerce::number(cells[2]).unwrap_or(0.0),
                gross_amount: text(cells[3], "$0"),
                billed_amount: text(cells[4], "$0"),
                models,
            })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_customer_id_patterns_in_order() {
        assert_eq!(
            extract_customer_id(r#"<script>{"customerId": 12345}</script>"#).as_deref(),
            Some("12345")
        );
        assert_eq!(
            extract_customer_id(r#"{"customer_id":987}"#).as_deref(),
            Some("987")
        );
        assert_eq!(
            extract_customer_id(r#"<a href="/x?customer_id=55">"#).as_deref(),
            Some("55")
        );
        assert_eq!(
            extract_customer_id(r#"<div data-customer-id="77"></div>"#).as_deref(),
            Some("77")
        );
        // earlier pattern wins even when it appears later in the page
        assert_eq!(
            extract_customer_id(r#"customer_id=1 ... "customerId": 2"#).as_deref(),
            Some("2")
        );
        assert_eq!(extract_customer_id("<html>nothing</html>"), None);
    }

    #[test]
    fn test_parse_usage_card() {
        let card = parse_usage_card(&json!({
            "netQuantity": 20,
            "discountQuantity": "680.0",
            "userPremiumRequestEntitlement": 1000,
            "netBilledAmount": 0.8
        }))
        .unwrap();
        assert_eq!(card.used(), 700.0);
        assert_eq!(card.remaining(), 300);
        assert_eq!(card.net_billed_amount, 0.8);
    }

    #[test]
    fn test_parse_usage_card_snake_case() {
        let card = parse_usage_card(&json!({
            "net_quantity": 310.0,
            "discount_quantity": 0,
            "user_premium_request_entitlement": 300
        }))
        .unwrap();
        assert_eq!(card.remaining(), -10);
    }

    #[test]
    fn test_unrelated_document_is_not_a_card() {
        assert_eq!(parse_usage_card(&json!({"error": "nope"})), None);
    }

    #[test]
    fn test_parse_usage_table() {
        let doc = json!({
            "table": {
                "rows": [
                    {
                        "cells": [
                            {"value": "Jan 3"},
                            {"value": "1,204"},
                            {"value": "3"},
                            {"value": "$48.28"},
                            {"value": "$0.12"}
                        ],
                        "subtable": {
                            "rows": [
                                {"cells": [
                                    {"value": "Claude Sonnet 4"},
                                    {"value": "1,200"},
                                    {"value": "3"},
                                    {"value": "$48.12"},
                                    {"value": "$0.12"}
                                ]},
                                {"cells": [{"value": "short"}]}
                            ]
                        }
                    },
                    {"cells": [{"value": "Jan 2"}]}
                ]
            }
        });

        let days = parse_usage_table(&doc);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, "Jan 3");
        assert_eq!(days[0].included_requests, 1204.0);
        assert_eq!(days[0].total_requests(), 1207.0);
        assert_eq!(days[0].billed_amount, "$0.12");
        assert_eq!(days[0].models.len(), 1);
        assert_eq!(days[0].models[0].model, "Claude Sonnet 4");
        assert_eq!(days[0].models[0].gross_amount, "$48.12");
        assert_eq!(days[0].models[0].cost, "$0.12");
    }

    #[test]
    fn test_parse_usage_table_missing() {
        assert!(parse_usage_table(&json!({})).is_empty());
    }
}
