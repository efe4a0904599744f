pub mod json_backend;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::forecast::backend::{ModelKind, TrainedModel};
use crate::ledger::{ExpenseBook, ExpenseRecord, Frequency};

/// Persistence for trained models, keyed by name plus engine kind.
///
/// A linear and a seasonal model saved under the same name are separate
/// entries. A missing key is `Ok(None)`, never an error, so callers can fall
/// through to training.
pub trait ModelStore: Send + Sync {
    /// Stores `model` under `name` and the model's own kind.
    fn save(&self, name: &str, model: &TrainedModel) -> Result<()>;
    fn load(&self, name: &str, kind: ModelKind) -> Result<Option<TrainedModel>>;

    /// Returns whether a model was stored under `name` and `kind`.
    fn remove(&self, name: &str, kind: ModelKind) -> Result<bool>;
    fn list(&self) -> Result<Vec<StoredModelInfo>>;
}

impl<T: ModelStore + ?Sized> ModelStore for &T {
    fn save(&self, name: &str, model: &TrainedModel) -> Result<()> {
        (**self).save(name, model)
    }

    fn load(&self, name: &str, kind: ModelKind) -> Result<Option<TrainedModel>> {
        (**self).load(name, kind)
    }

    fn remove(&self, name: &str, kind: ModelKind) -> Result<bool> {
        (**self).remove(name, kind)
    }

    fn list(&self) -> Result<Vec<StoredModelInfo>> {
        (**self).list()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredModelInfo {
    pub name: String,
    pub kind: ModelKind,
    pub frequency: Frequency,
    pub saved_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Anything that can hand over the full set of expense records.
pub trait TransactionSource {
    fn fetch_all(&self) -> Result<Vec<ExpenseRecord>>;
}

impl TransactionSource for [ExpenseRecord] {
    fn fetch_all(&self) -> Result<Vec<ExpenseRecord>> {
        Ok(self.to_vec())
    }
}

impl TransactionSource for Vec<ExpenseRecord> {
    fn fetch_all(&self) -> Result<Vec<ExpenseRecord>> {
        Ok(self.clone())
    }
}

impl TransactionSource for ExpenseBook {
    fn fetch_all(&self) -> Result<Vec<ExpenseRecord>> {
        Ok(self.records())
    }
}

pub use json_backend::{JsonExpenseStore, JsonModelStore, MODEL_SCHEMA_VERSION};
