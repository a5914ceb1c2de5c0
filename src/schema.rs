//! Expense data model, validation, and the structured-output schema
//! shared by every oracle operation that returns a record.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Closed set of spending categories. The wire spelling (used in oracle
/// schemas, ledger rows, and summaries) is the serde rename where given,
/// otherwise the variant name itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Household,
    Internet,
    Tech,
    Car,
    Gas,
    Groceries,
    #[serde(rename = "Food & Dining")]
    FoodAndDining,
    #[serde(rename = "Clothing & Gifts")]
    ClothingAndGifts,
    Insurance,
    Drugstore,
    Health,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Household,
        Category::Internet,
        Category::Tech,
        Category::Car,
        Category::Gas,
        Category::Groceries,
        Category::FoodAndDining,
        Category::ClothingAndGifts,
        Category::Insurance,
        Category::Drugstore,
        Category::Health,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Household => "Household",
            Category::Internet => "Internet",
            Category::Tech => "Tech",
            Category::Car => "Car",
            Category::Gas => "Gas",
            Category::Groceries => "Groceries",
            Category::FoodAndDining => "Food & Dining",
            Category::ClothingAndGifts => "Clothing & Gifts",
            Category::Insurance => "Insurance",
            Category::Drugstore => "Drugstore",
            Category::Health => "Health",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub name: String,
    /// Units purchased. Missing on loosely-worded receipts, so it
    /// defaults to a single unit.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Unit price, not line total.
    pub price: Decimal,
}

fn default_quantity() -> u32 {
    1
}

/// A structured expense, as extracted by the oracle and confirmed by the
/// user. `total` is authoritative as printed on the receipt and is never
/// reconciled against `items` (discounts and rounding make them disagree
/// on real receipts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub merchant: String,
    pub date: NaiveDate,
    /// May be empty for text-entered expenses ("spent 20 on parking").
    #[serde(default)]
    pub items: Vec<ExpenseItem>,
    pub category: Category,
    #[serde(default)]
    pub tax: Decimal,
    pub total: Decimal,
}

impl ExpenseRecord {
    /// Field-level checks the schema alone cannot express. A violation
    /// here is treated the same as a failed extraction.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.merchant.trim().is_empty() {
            return Err(InvalidRecord::EmptyMerchant);
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(InvalidRecord::EmptyItemName { index });
            }
            if item.quantity == 0 {
                return Err(InvalidRecord::ZeroQuantity { index });
            }
            if item.price < Decimal::ZERO {
                return Err(InvalidRecord::NegativePrice { index });
            }
        }
        if self.tax < Decimal::ZERO {
            return Err(InvalidRecord::NegativeTax);
        }
        if self.total < Decimal::ZERO {
            return Err(InvalidRecord::NegativeTotal);
        }
        Ok(())
    }
}

/// Why a structurally well-formed record was still rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRecord {
    #[error("merchant name is empty")]
    EmptyMerchant,
    #[error("item {index} has an empty name")]
    EmptyItemName { index: usize },
    #[error("item {index} has zero quantity")]
    ZeroQuantity { index: usize },
    #[error("item {index} has a negative price")]
    NegativePrice { index: usize },
    #[error("tax is negative")]
    NegativeTax,
    #[error("total is negative")]
    NegativeTotal,
}

/// Routing outcome for free text received while no record is pending.
#[derive(Debug, Clone, PartialEq)]
pub enum TextIntent {
    /// The text described a new expense.
    Expense(ExpenseRecord),
    /// The text asks a question about recorded history.
    Query,
}

/// JSON schema for an [`ExpenseRecord`], in the strict structured-output
/// dialect: every property required, no additionals. Defaults (quantity,
/// tax) are applied on our side during deserialization.
pub fn expense_json_schema() -> Value {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "merchant": { "type": "string", "description": "Name of the merchant" },
            "date": { "type": "string", "description": "Date of purchase in YYYY-MM-DD format" },
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "quantity": { "type": "integer", "description": "Units purchased, 1 if not printed" },
                        "price": { "type": "number", "description": "Unit price" }
                    },
                    "required": ["name", "quantity", "price"],
                    "additionalProperties": false
                }
            },
            "category": { "type": "string", "enum": categories },
            "tax": { "type": "number", "description": "Tax amount, 0 if not printed" },
            "total": { "type": "number" }
        },
        "required": ["merchant", "date", "items", "category", "tax", "total"],
        "additionalProperties": false
    })
}

/// JSON schema for the free-text classification outcome: either an
/// expense (with data) or a query (data null).
pub fn classification_json_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "enum": ["expense", "query"] },
            "data": { "anyOf": [expense_json_schema(), { "type": "null" }] }
        },
        "required": ["type", "data"],
        "additionalProperties": false
    })
}
