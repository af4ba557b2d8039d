//! Totals over a transaction view.

use crate::{Record, Transaction, TransactionType};
use serde::Serialize;

/// Income, expense and balance over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    /// Most recent records, newest first
    pub recent: Vec<Record<Transaction>>,
}

impl Summary {
    /// Summarize a view that is already ordered newest first.
    pub fn of(records: &[Record<Transaction>], recent: usize) -> Self {
        let (total_income, total_expense) =
            records
                .iter()
                .fold((0.0, 0.0), |(income, expense), record| match record.payload.kind {
                    TransactionType::Income => (income + record.payload.amount, expense),
                    TransactionType::Expense => (income, expense + record.payload.amount),
                });

        Self {
            total_income,
            total_expense,
            balance: total_income - total_expense,
            recent: records.iter().take(recent).cloned().collect(),
        }
    }
}
