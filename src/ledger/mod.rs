//! Expense records and the calendar used to bucket them into periods.

pub mod expense;
pub mod frequency;

pub use expense::{Expense, ExpenseBook, ExpensePatch, ExpenseRecord};
pub use frequency::Frequency;
