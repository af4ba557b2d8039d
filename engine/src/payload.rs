//! Payload types carried by records.
//!
//! Payloads are immutable once a record is created; there is no edit path.
//! Each payload kind decides which dedup leniency applies to it and whether
//! the duplicate-submission guard runs before it is persisted.

use crate::{error::Result, record::RecordKind, Error};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

/// Behaviour shared by every payload kind stored in a [`Record`](crate::Record).
pub trait Payload:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Which collection records of this payload live in.
    const KIND: RecordKind;

    /// Whether signature matching uses the lenient window.
    fn lenient(&self) -> bool {
        false
    }

    /// Whether the duplicate-submission guard applies on add.
    fn guarded(&self) -> bool {
        false
    }

    /// Check that the payload is acceptable before it is persisted.
    fn validate(&self) -> Result<()>;
}

/// Direction of a money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An income or expense entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// User-facing date (ISO 8601), distinct from the record's creation time
    #[serde(default)]
    pub date: String,
}

impl Transaction {
    pub fn income(amount: f64, category: impl Into<String>) -> Self {
        Self::new(TransactionType::Income, amount, category)
    }

    pub fn expense(amount: f64, category: impl Into<String>) -> Self {
        Self::new(TransactionType::Expense, amount, category)
    }

    pub fn new(kind: TransactionType, amount: f64, category: impl Into<String>) -> Self {
        Self {
            kind,
            amount,
            category: category.into(),
            description: String::new(),
            date: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn is_income(&self) -> bool {
        self.kind == TransactionType::Income
    }
}

impl Payload for Transaction {
    const KIND: RecordKind = RecordKind::Transaction;

    fn lenient(&self) -> bool {
        self.is_income()
    }

    fn guarded(&self) -> bool {
        self.is_income()
    }

    fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::InvalidAmount(self.amount.to_string()));
        }
        if self.category.trim().is_empty() {
            return Err(Error::MissingRequiredField("category".into()));
        }
        Ok(())
    }
}

/// A scanned document kept alongside transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    /// Location of the locally stored image
    pub image_uri: String,
    #[serde(default)]
    pub date: String,
}

impl Document {
    pub fn new(title: impl Into<String>, image_uri: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            image_uri: image_uri.into(),
            date: date.into(),
        }
    }
}

impl Payload for Document {
    const KIND: RecordKind = RecordKind::Document;

    fn validate(&self) -> Result<()> {
        if self.image_uri.is_empty() {
            return Err(Error::MissingRequiredField("imageUri".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transaction_json_shape() {
        let tx = Transaction::expense(50.0, "groceries").with_description("weekly shop");
        let value = serde_json::to_value(&tx).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "expense",
                "amount": 50.0,
                "category": "groceries",
                "description": "weekly shop",
                "date": ""
            })
        );
    }

    #[test]
    fn transaction_defaults_missing_optional_fields() {
        let tx: Transaction =
            serde_json::from_value(json!({"type": "income", "amount": 10, "category": "gift"}))
                .unwrap();
        assert!(tx.is_income());
        assert_eq!(tx.description, "");
    }

    #[test]
    fn validate_rejects_bad_amounts() {
        assert!(Transaction::expense(0.0, "dining").validate().is_err());
        assert!(Transaction::expense(-3.0, "dining").validate().is_err());
        assert!(Transaction::expense(f64::NAN, "dining").validate().is_err());
        assert!(Transaction::expense(12.5, "dining").validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_category() {
        let err = Transaction::income(10.0, "  ").validate().unwrap_err();
        assert_eq!(err, Error::MissingRequiredField("category".into()));
    }

    #[test]
    fn only_income_is_lenient_and_guarded() {
        let income = Transaction::income(100.0, "salary");
        let expense = Transaction::expense(100.0, "rent");
        assert!(income.lenient() && income.guarded());
        assert!(!expense.lenient() && !expense.guarded());

        let doc = Document::new("receipt", "/tmp/a.jpg", "");
        assert!(!doc.lenient() && !doc.guarded());
    }

    #[test]
    fn document_requires_image() {
        assert!(Document::new("", "", "").validate().is_err());
        assert!(Document::new("", "file:///a.jpg", "").validate().is_ok());
    }
}
