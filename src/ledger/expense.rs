use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ForecastError, Result};

pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_CATEGORY_LEN: usize = 128;

/// The `(date, amount)` pair consumed by the forecasting pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExpenseRecord {
    pub date: NaiveDate,
    pub amount: f64,
}

impl ExpenseRecord {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

/// A logged expense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Expense {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: f64,
        category: Option<String>,
    ) -> Result<Self> {
        let expense = Self {
            id: Uuid::new_v4(),
            date,
            description: description.into().trim().to_string(),
            amount,
            category: normalize_category(category),
        };
        expense.validate()?;
        Ok(expense)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ForecastError::InvalidInput(format!(
                "expense amount must be positive, got {}",
                self.amount
            )));
        }
        let description_len = self.description.chars().count();
        if description_len == 0 || description_len > MAX_DESCRIPTION_LEN {
            return Err(ForecastError::InvalidInput(format!(
                "description must be 1 to {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if let Some(category) = &self.category {
            if category.chars().count() > MAX_CATEGORY_LEN {
                return Err(ForecastError::InvalidInput(format!(
                    "category must be at most {} characters",
                    MAX_CATEGORY_LEN
                )));
            }
        }
        Ok(())
    }

    pub fn record(&self) -> ExpenseRecord {
        ExpenseRecord::new(self.date, self.amount)
    }
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpensePatch {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
}

/// In-memory expense journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseBook {
    #[serde(default)]
    expenses: Vec<Expense>,
}

impl ExpenseBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, expense: Expense) -> Result<Uuid> {
        expense.validate()?;
        let id = expense.id;
        self.expenses.push(expense);
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Expense> {
        self.expenses.iter().find(|expense| expense.id == id)
    }

    /// Applies `patch` and re-validates; the stored expense is unchanged on error.
    pub fn update(&mut self, id: Uuid, patch: ExpensePatch) -> Result<&Expense> {
        let index = self
            .position(id)
            .ok_or_else(|| ForecastError::InvalidInput(format!("expense {} not found", id)))?;
        let mut updated = self.expenses[index].clone();
        if let Some(date) = patch.date {
            updated.date = date;
        }
        if let Some(description) = patch.description {
            updated.description = description.trim().to_string();
        }
        if let Some(amount) = patch.amount {
            updated.amount = amount;
        }
        if patch.category.is_some() {
            updated.category = normalize_category(patch.category);
        }
        updated.validate()?;
        self.expenses[index] = updated;
        Ok(&self.expenses[index])
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Expense> {
        let index = self.position(id)?;
        Some(self.expenses.remove(index))
    }

    /// Expenses ordered by date; same-day entries keep insertion order.
    pub fn list(&self) -> Vec<&Expense> {
        let mut sorted: Vec<&Expense> = self.expenses.iter().collect();
        sorted.sort_by_key(|expense| expense.date);
        sorted
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    pub fn records(&self) -> Vec<ExpenseRecord> {
        self.expenses.iter().map(Expense::record).collect()
    }

    pub fn total_by_date(&self) -> BTreeMap<NaiveDate, f64> {
        let mut totals = BTreeMap::new();
        for expense in &self.expenses {
            *totals.entry(expense.date).or_insert(0.0) += expense.amount;
        }
        totals
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.expenses.iter().position(|expense| expense.id == id)
    }
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
