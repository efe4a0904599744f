use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    errors::{ForecastError, Result},
    forecast::backend::{ModelKind, TrainedModel},
    ledger::{ExpenseBook, ExpenseRecord},
    utils::{ensure_dir, paths::PathResolver},
};

use super::{ModelStore, StoredModelInfo, TransactionSource};

const JSON_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;
const EXPENSES_STEM: &str = "expenses";

pub const MODEL_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelEnvelope {
    schema_version: u32,
    kind: ModelKind,
    name: String,
    saved_at: DateTime<Utc>,
    model: TrainedModel,
}

/// Stores each model as `<dir>/<canonical name>.<kind>.json`.
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    dir: PathBuf,
}

impl JsonModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, name: &str, kind: ModelKind) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{}",
            canonical_name(name),
            kind.label(),
            JSON_EXTENSION
        ))
    }

    fn read_envelope(path: &Path) -> Result<ModelEnvelope> {
        let data = fs::read_to_string(path)?;
        let raw: serde_json::Value = serde_json::from_str(&data)?;
        let version = raw
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                ForecastError::StorageError(format!(
                    "model file `{}` has no schema version",
                    path.display()
                ))
            })?;
        if version > u64::from(MODEL_SCHEMA_VERSION) {
            return Err(ForecastError::StorageError(format!(
                "model file `{}` is from a newer schema version ({})",
                path.display(),
                version
            )));
        }
        let envelope: ModelEnvelope = serde_json::from_value(raw)?;
        if envelope.kind != envelope.model.kind() {
            return Err(ForecastError::StorageError(format!(
                "model file `{}` is labelled {} but holds a {} model",
                path.display(),
                envelope.kind,
                envelope.model.kind()
            )));
        }
        Ok(envelope)
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, name: &str, model: &TrainedModel) -> Result<()> {
        let path = self.model_path(name, model.kind());
        let envelope = ModelEnvelope {
            schema_version: MODEL_SCHEMA_VERSION,
            kind: model.kind(),
            name: name.to_string(),
            saved_at: Utc::now(),
            model: model.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        replace_file(&path, &json)?;
        debug!(model = name, path = %path.display(), "saved model");
        Ok(())
    }

    fn load(&self, name: &str, kind: ModelKind) -> Result<Option<TrainedModel>> {
        let path = self.model_path(name, kind);
        if !path.exists() {
            return Ok(None);
        }
        let envelope = Self::read_envelope(&path)?;
        if envelope.kind != kind {
            return Err(ForecastError::StorageError(format!(
                "model file `{}` holds a {} model, expected {}",
                path.display(),
                envelope.kind,
                kind
            )));
        }
        Ok(Some(envelope.model))
    }

    fn remove(&self, name: &str, kind: ModelKind) -> Result<bool> {
        let path = self.model_path(name, kind);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<StoredModelInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            let envelope = match Self::read_envelope(&path) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable model file");
                    continue;
                }
            };
            entries.push(StoredModelInfo {
                frequency: envelope.model.frequency(),
                name: envelope.name,
                kind: envelope.kind,
                saved_at: envelope.saved_at,
                path,
            });
        }
        entries.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.kind.label().cmp(b.kind.label()))
        });
        Ok(entries)
    }
}

/// The expense journal at `<home>/expenses.json`, with timestamped backups
/// of the previous file under `<home>/backups`.
#[derive(Debug, Clone)]
pub struct JsonExpenseStore {
    path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonExpenseStore {
    pub fn new(root: Option<PathBuf>, retention: Option<usize>) -> Result<Self> {
        let base = PathResolver::resolve_base(root);
        ensure_dir(&base)?;
        let backups_dir = PathResolver::backup_dir_in(&base);
        ensure_dir(&backups_dir)?;
        Ok(Self {
            path: PathResolver::expenses_file_in(&base),
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// An absent journal loads as an empty book.
    pub fn load(&self) -> Result<ExpenseBook> {
        if !self.path.exists() {
            return Ok(ExpenseBook::new());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, book: &ExpenseBook) -> Result<()> {
        if self.path.exists() {
            self.backup_existing_file()?;
        }
        let json = serde_json::to_string_pretty(book)?;
        replace_file(&self.path, &json)?;
        debug!(expenses = book.len(), path = %self.path.display(), "saved expense journal");
        Ok(())
    }

    /// Backup file names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            let file_name = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            entries.push(file_name);
        }
        entries.sort_by(|a, b| parse_backup_timestamp(b).cmp(&parse_backup_timestamp(a)));
        Ok(entries)
    }

    fn backup_existing_file(&self) -> Result<()> {
        ensure_dir(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let backup_name = format!("{}_{}.{}", EXPENSES_STEM, timestamp, JSON_EXTENSION);
        fs::copy(&self.path, self.backups_dir.join(&backup_name))?;
        self.prune_backups()
    }

    fn prune_backups(&self) -> Result<()> {
        let backups = self.list_backups()?;
        for entry in backups.iter().skip(self.retention) {
            let _ = fs::remove_file(self.backups_dir.join(entry));
        }
        Ok(())
    }
}

impl TransactionSource for JsonExpenseStore {
    fn fetch_all(&self) -> Result<Vec<ExpenseRecord>> {
        Ok(self.load()?.records())
    }
}

/// Stages `data` in a staging file of its own next to `path` and renames it
/// into place. Readers see either the old file or the new one, and
/// concurrent writers never share a staging file; the last rename wins.
fn replace_file(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_path(path);
    let staged = write_atomic(&tmp, data)
        .and_then(|()| fs::rename(&tmp, path).map_err(ForecastError::from));
    if staged.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    staged
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "model".into()
    } else {
        sanitized
    }
}

fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(".json")?;
    let mut parts = stem.rsplitn(3, '_');
    let time_part = parts.next()?;
    let date_part = parts.next()?;
    if !is_digits(date_part, 8) || !is_digits(time_part, 4) {
        return None;
    }
    let raw = format!("{}{}", date_part, time_part);
    NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

/// `<file>.<ext>.<uuid>.tmp`, unique per call.
fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let unique = Uuid::new_v4().simple();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}.{}", existing, unique, TMP_SUFFIX),
        None => format!("{}.{}", unique, TMP_SUFFIX),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}
