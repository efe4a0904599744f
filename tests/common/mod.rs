#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use spend_forecast::{
    errors::Result,
    forecast::{ModelKind, TrainedModel},
    ledger::{ExpenseRecord, Frequency},
    storage::{JsonModelStore, ModelStore, StoredModelInfo},
};
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A fresh directory that outlives the calling test.
pub fn temp_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

pub fn model_store() -> JsonModelStore {
    JsonModelStore::new(temp_home().join("models")).expect("create model store")
}

/// `days` daily records starting 2025-01-01 with `amount(i)` on day `i`.
pub fn daily_records(days: usize, amount: impl Fn(usize) -> f64) -> Vec<ExpenseRecord> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
    (0..days)
        .map(|i| {
            let date = Frequency::Day
                .add_periods(start, i as i64)
                .expect("date in range");
            ExpenseRecord::new(date, amount(i))
        })
        .collect()
}

/// Wraps a store and counts every call made through it.
pub struct CountingStore<S> {
    pub inner: S,
    pub saves: AtomicUsize,
    pub loads: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl<S: ModelStore> ModelStore for CountingStore<S> {
    fn save(&self, name: &str, model: &TrainedModel) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(name, model)
    }

    fn load(&self, name: &str, kind: ModelKind) -> Result<Option<TrainedModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(name, kind)
    }

    fn remove(&self, name: &str, kind: ModelKind) -> Result<bool> {
        self.inner.remove(name, kind)
    }

    fn list(&self) -> Result<Vec<StoredModelInfo>> {
        self.inner.list()
    }
}
