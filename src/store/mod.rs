mod document;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use document::{Config, Route};

/// Errors raised by the config store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize config: {source}")]
    Serialize { source: serde_json::Error },

    #[error("cannot restore backup '{name}': {reason}")]
    Restore { name: String, reason: String },
}

/// Metadata sidecar written next to each backup file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub config_file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// A backup file paired with its metadata
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub filename: String,
    pub metadata: BackupMetadata,
}

/// Manages the sing-box configuration file and its backups.
///
/// Every operation re-reads the file from disk; the file is the single
/// source of truth and there is no cross-request coordination. Concurrent
/// load-then-save sequences are last-write-wins.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
    backup_dir: PathBuf,
}

impl ConfigStore {
    /// Create a store for the given config path, ensuring the sibling
    /// `backups/` directory exists.
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let config_path = config_path.into();
        let backup_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("backups");

        fs::create_dir_all(&backup_dir).map_err(|source| StoreError::Write {
            path: backup_dir.clone(),
            source,
        })?;

        Ok(Self {
            config_path,
            backup_dir,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Load the current configuration. A missing file yields the default
    /// document without creating it.
    pub fn load(&self) -> Result<Config, StoreError> {
        let data = match fs::read(&self.config_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Config::default_document());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.config_path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&data).map_err(|source| StoreError::Parse {
            path: self.config_path.clone(),
            source,
        })
    }

    /// Save the configuration, backing up the currently persisted file
    /// first. The backup is a no-op when no file exists yet, so a
    /// first-ever save produces no backup.
    pub fn save(&self, config: &Config) -> Result<(), StoreError> {
        self.backup_auto()?;

        let data = serde_json::to_vec_pretty(config)
            .map_err(|source| StoreError::Serialize { source })?;

        fs::write(&self.config_path, data).map_err(|source| StoreError::Write {
            path: self.config_path.clone(),
            source,
        })
    }

    fn backup_auto(&self) -> Result<(), StoreError> {
        let name = format!("Auto backup {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        self.create_backup(&name, "Automatic backup")
    }

    /// Snapshot the current config file under a sanitized, timestamped
    /// filename plus a metadata sidecar. No-op when no config file exists.
    pub fn create_backup(&self, name: &str, description: &str) -> Result<(), StoreError> {
        let data = match fs::read(&self.config_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.config_path.clone(),
                    source,
                })
            }
        };

        let timestamp = Local::now();
        let mut safe_name = sanitize_filename(name);
        if safe_name.is_empty() {
            safe_name = "backup".to_string();
        }
        let filename = format!("{}-{}.json", safe_name, timestamp.format("%Y%m%d-%H%M%S"));
        let backup_path = self.backup_dir.join(&filename);

        fs::write(&backup_path, data).map_err(|source| StoreError::Write {
            path: backup_path.clone(),
            source,
        })?;

        let metadata = BackupMetadata {
            name: name.to_string(),
            description: description.to_string(),
            timestamp: timestamp.with_timezone(&Utc),
            config_file: filename.clone(),
            version: "1.0".to_string(),
        };

        let meta_path = self.backup_dir.join(format!("{filename}.meta"));
        let meta_json = serde_json::to_vec_pretty(&metadata)
            .map_err(|source| StoreError::Serialize { source })?;

        fs::write(&meta_path, meta_json).map_err(|source| StoreError::Write {
            path: meta_path,
            source,
        })
    }

    /// List all backups, newest first. Entries without a readable metadata
    /// sidecar are synthesized from the file's modification time.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, StoreError> {
        let entries = fs::read_dir(&self.backup_dir).map_err(|source| StoreError::Read {
            path: self.backup_dir.clone(),
            source,
        })?;

        let mut backups = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let filename = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let meta_path = self.backup_dir.join(format!("{filename}.meta"));
            let metadata = fs::read(&meta_path)
                .ok()
                .and_then(|data| serde_json::from_slice::<BackupMetadata>(&data).ok())
                .unwrap_or_else(|| {
                    let mtime = entry
                        .metadata()
                        .and_then(|m| m.modified())
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now());
                    BackupMetadata {
                        name: filename.clone(),
                        description: String::new(),
                        timestamp: mtime,
                        config_file: filename.clone(),
                        version: String::new(),
                    }
                });

            backups.push(BackupInfo { filename, metadata });
        }

        backups.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        Ok(backups)
    }

    /// Restore a backup by filename. The backup is validated as JSON before
    /// anything is written, so an invalid backup leaves the live file
    /// untouched.
    pub fn restore_backup(&self, backup_name: &str) -> Result<(), StoreError> {
        let backup_path = self.backup_dir.join(backup_name);

        let data = fs::read(&backup_path).map_err(|source| StoreError::Restore {
            name: backup_name.to_string(),
            reason: source.to_string(),
        })?;

        if let Err(e) = serde_json::from_slice::<Config>(&data) {
            return Err(StoreError::Restore {
                name: backup_name.to_string(),
                reason: format!("invalid JSON: {e}"),
            });
        }

        self.backup_auto()?;

        fs::write(&self.config_path, data).map_err(|source| StoreError::Write {
            path: self.config_path.clone(),
            source,
        })
    }

    pub fn get_rules(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .load()?
            .route
            .and_then(|r| r.rules)
            .unwrap_or_default())
    }

    pub fn update_rules(&self, rules: Vec<Value>) -> Result<(), StoreError> {
        let mut config = self.load()?;
        config.route.get_or_insert_with(Route::default).rules = Some(rules);
        self.save(&config)
    }

    pub fn get_rule_actions(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .load()?
            .route
            .and_then(|r| r.rule_actions)
            .unwrap_or_default())
    }

    pub fn update_rule_actions(&self, actions: Vec<Value>) -> Result<(), StoreError> {
        let mut config = self.load()?;
        config
            .route
            .get_or_insert_with(Route::default)
            .rule_actions = Some(actions);
        self.save(&config)
    }

    pub fn get_outbounds(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.load()?.outbounds.unwrap_or_default())
    }

    pub fn update_outbounds(&self, outbounds: Vec<Value>) -> Result<(), StoreError> {
        let mut config = self.load()?;
        config.outbounds = Some(outbounds);
        self.save(&config)
    }

    /// All outbound tags in document order.
    pub fn outbound_tags(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .get_outbounds()?
            .iter()
            .filter_map(|o| o.get("tag").and_then(Value::as_str).map(String::from))
            .collect())
    }

    /// Rename an outbound tag and rewrite every reference to it: the
    /// outbound's own tag, group member lists, selector defaults, rule
    /// outbound targets (including nested logical sub-rules) and the route
    /// final target.
    pub fn rename_outbound(&self, old_tag: &str, new_tag: &str) -> Result<(), StoreError> {
        let mut config = self.load()?;

        if let Some(outbounds) = config.outbounds.as_mut() {
            for outbound in outbounds.iter_mut() {
                let Some(map) = outbound.as_object_mut() else {
                    continue;
                };
                if map.get("tag").and_then(Value::as_str) == Some(old_tag) {
                    map.insert("tag".to_string(), Value::String(new_tag.to_string()));
                }
                if let Some(members) = map.get_mut("outbounds").and_then(Value::as_array_mut) {
                    for member in members.iter_mut() {
                        if member.as_str() == Some(old_tag) {
                            *member = Value::String(new_tag.to_string());
                        }
                    }
                }
                if map.get("default").and_then(Value::as_str) == Some(old_tag) {
                    map.insert("default".to_string(), Value::String(new_tag.to_string()));
                }
            }
        }

        if let Some(route) = config.route.as_mut() {
            if let Some(rules) = route.rules.as_mut() {
                for rule in rules.iter_mut() {
                    rename_in_rule(rule, old_tag, new_tag);
                }
            }
            if route.final_outbound.as_deref() == Some(old_tag) {
                route.final_outbound = Some(new_tag.to_string());
            }
        }

        self.save(&config)
    }
}

fn rename_in_rule(rule: &mut Value, old_tag: &str, new_tag: &str) {
    let Some(map) = rule.as_object_mut() else {
        return;
    };
    if map.get("outbound").and_then(Value::as_str) == Some(old_tag) {
        map.insert("outbound".to_string(), Value::String(new_tag.to_string()));
    }
    // Logical rules nest their operands under "rules"
    if let Some(nested) = map.get_mut("rules").and_then(Value::as_array_mut) {
        for sub in nested.iter_mut() {
            rename_in_rule(sub, old_tag, new_tag);
        }
    }
}

/// Remove the item at `from` and reinsert it at `to`, matching the
/// drag-and-drop semantics of the reorder endpoints. Returns false without
/// touching the list when either index is out of range.
pub fn move_item<T>(list: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= list.len() || to >= list.len() {
        return false;
    }
    let item = list.remove(from);
    list.insert(to, item);
    true
}

/// Replace characters that are invalid in filenames, collapsing spaces to
/// dashes and trimming leading/trailing dashes.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '-',
            other => other,
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_invalid_characters() {
        assert_eq!(sanitize_filename("Auto backup 2024-01-01"), "Auto-backup-2024-01-01");
        assert_eq!(sanitize_filename("a/b\\c:d"), "a-b-c-d");
        assert_eq!(sanitize_filename("///"), "");
    }

    #[test]
    fn move_item_adjacent_swap() {
        let mut v = vec![1, 2, 3, 4];
        assert!(move_item(&mut v, 1, 2));
        assert_eq!(v, vec![1, 3, 2, 4]);
    }

    #[test]
    fn move_item_to_front_and_back() {
        let mut v = vec![1, 2, 3, 4];
        assert!(move_item(&mut v, 3, 0));
        assert_eq!(v, vec![4, 1, 2, 3]);

        let mut v = vec![1, 2, 3, 4];
        assert!(move_item(&mut v, 0, 3));
        assert_eq!(v, vec![2, 3, 4, 1]);
    }

    #[test]
    fn move_item_preserves_multiset() {
        let mut v = vec!["a", "b", "c", "b"];
        assert!(move_item(&mut v, 1, 3));
        let mut sorted = v.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "b", "c"]);
    }

    #[test]
    fn serialize_error_does_not_blame_the_file() {
        let source = serde_json::from_str::<Value>("not json").expect_err("parse error");
        let err = StoreError::Serialize { source };
        let message = err.to_string();
        assert!(message.contains("serialize"));
        assert!(!message.contains("invalid JSON in"));
    }

    #[test]
    fn move_item_rejects_out_of_range() {
        let mut v = vec![1, 2];
        assert!(!move_item(&mut v, 2, 0));
        assert!(!move_item(&mut v, 0, 5));
        assert_eq!(v, vec![1, 2]);
    }
}
