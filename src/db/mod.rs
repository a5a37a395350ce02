mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::models::*;
use crate::normalize::Normalizer;

const FEATURE_COLUMNS: &str = "id, organization, project, description, date_created, date_updated,
     value_type, default_value, environments, rules, environment_settings";

/// Feature store backed by SQLite.
///
/// Every record read through the store passes through its [`Normalizer`];
/// writes are stored exactly as given.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    normalizer: Arc<Normalizer>,
}

impl Database {
    pub fn open(path: PathBuf, normalizer: Normalizer) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            normalizer: Arc::new(normalizer),
        })
    }

    pub fn open_with_config(config: &StoreConfig) -> anyhow::Result<Self> {
        let path = config.resolve_database_path()?;
        tracing::info!("Opening feature store at {}", path.display());
        Self::open(path, config.normalizer())
    }

    pub fn open_memory(normalizer: Normalizer) -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            normalizer: Arc::new(normalizer),
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        schema::run_migrations(&conn)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ============================================================
    // Feature operations
    // ============================================================

    /// All features of `organization`, restricted to `project` when given.
    pub fn list_features(
        &self,
        organization: &str,
        project: Option<&str>,
    ) -> Result<Vec<Feature>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FEATURE_COLUMNS} FROM features
             WHERE organization = ?1 AND (?2 IS NULL OR project = ?2)
             ORDER BY rowid"
        ))?;

        let features = stmt
            .query_map((organization, project), feature_from_row)?
            .map(|row| row.map(|f| self.normalizer.normalize(f)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(features)
    }

    pub fn get_feature(&self, organization: &str, id: &str) -> Result<Option<Feature>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FEATURE_COLUMNS} FROM features WHERE organization = ? AND id = ?"
        ))?;

        let feature = stmt
            .query_row((organization, id), feature_from_row)
            .optional()?;

        Ok(feature.map(|f| self.normalizer.normalize(f)))
    }

    /// Insert `feature` as given. Fails with [`StoreError::Conflict`] when the
    /// organization already has a feature with the same id.
    pub fn create_feature(&self, feature: &Feature) -> Result<()> {
        let environments = encode_json("environments", &feature.environments)?;
        let rules = encode_json("rules", &feature.rules)?;
        let environment_settings =
            encode_json("environment_settings", &feature.environment_settings)?;

        let conn = self.lock()?;
        let inserted = conn.execute(
            &format!("INSERT INTO features ({FEATURE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            (
                &feature.id,
                &feature.organization,
                &feature.project,
                &feature.description,
                feature.date_created.to_rfc3339(),
                feature.date_updated.to_rfc3339(),
                &feature.value_type,
                &feature.default_value,
                environments,
                rules,
                environment_settings,
            ),
        );

        match inserted {
            Ok(_) => {
                tracing::debug!(
                    feature = %feature.id,
                    organization = %feature.organization,
                    "created feature"
                );
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict {
                    id: feature.id.clone(),
                    organization: feature.organization.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the fields named in `patch` on the matching feature.
    ///
    /// Returns `false` when no feature matches; that is not an error.
    pub fn update_feature(
        &self,
        organization: &str,
        id: &str,
        patch: &FeaturePatch,
    ) -> Result<bool> {
        let assignments = patch_assignments(patch)?;

        let conn = self.lock()?;
        if assignments.is_empty() {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM features WHERE organization = ? AND id = ?)",
                (organization, id),
                |row| row.get(0),
            )?;
            return Ok(exists);
        }

        let set_clause = assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let params = assignments
            .into_iter()
            .map(|(_, value)| value)
            .chain([Value::from(organization.to_string()), Value::from(id.to_string())]);

        let rows = conn.execute(
            &format!("UPDATE features SET {set_clause} WHERE organization = ? AND id = ?"),
            rusqlite::params_from_iter(params),
        )?;

        if rows > 0 {
            tracing::debug!(feature = %id, organization = %organization, "updated feature");
        }
        Ok(rows > 0)
    }

    /// Returns `false` when there was nothing to delete.
    pub fn delete_feature(&self, organization: &str, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM features WHERE organization = ? AND id = ?",
            (organization, id),
        )?;
        if rows > 0 {
            tracing::debug!(feature = %id, organization = %organization, "deleted feature");
        }
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            normalizer: self.normalizer.clone(),
        }
    }
}

/// Column assignments for the fields present in `patch`, in column order.
fn patch_assignments(patch: &FeaturePatch) -> Result<Vec<(&'static str, Value)>> {
    let mut set: Vec<(&'static str, Value)> = Vec::new();

    if let Some(project) = &patch.project {
        set.push(("project", Value::from(project.clone())));
    }
    if let Some(description) = &patch.description {
        set.push(("description", Value::from(description.clone())));
    }
    if let Some(date_created) = patch.date_created {
        set.push(("date_created", Value::from(date_created.to_rfc3339())));
    }
    if let Some(date_updated) = patch.date_updated {
        set.push(("date_updated", Value::from(date_updated.to_rfc3339())));
    }
    if let Some(value_type) = &patch.value_type {
        set.push(("value_type", Value::from(value_type.clone())));
    }
    if let Some(default_value) = &patch.default_value {
        set.push(("default_value", Value::from(default_value.clone())));
    }
    if patch.environments.is_some() {
        set.push(("environments", json_value("environments", &patch.environments)?));
    }
    if patch.rules.is_some() {
        set.push(("rules", json_value("rules", &patch.rules)?));
    }
    if patch.environment_settings.is_some() {
        set.push((
            "environment_settings",
            json_value("environment_settings", &patch.environment_settings)?,
        ));
    }

    Ok(set)
}

fn json_value<T: Serialize>(field: &'static str, value: &Option<T>) -> Result<Value> {
    Ok(encode_json(field, value)?.map_or(Value::Null, Value::Text))
}

fn encode_json<T: Serialize>(field: &'static str, value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v))
        .transpose()
        .map_err(|source| StoreError::Encode { field, source })
}

/// Decode a row selected with [`FEATURE_COLUMNS`].
///
/// Stored JSON that no longer decodes is treated as absent so that a damaged
/// column never makes the whole record unreadable.
fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<Feature> {
    let id: String = row.get(0)?;

    Ok(Feature {
        organization: row.get(1)?,
        project: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        date_created: parse_datetime(&id, "date_created", row.get(4)?),
        date_updated: parse_datetime(&id, "date_updated", row.get(5)?),
        value_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        default_value: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        environments: decode_json(&id, "environments", row.get(8)?),
        rules: decode_json(&id, "rules", row.get(9)?),
        environment_settings: decode_json(&id, "environment_settings", row.get(10)?),
        id,
    })
}

fn decode_json<T: DeserializeOwned>(id: &str, column: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str::<Option<T>>(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(feature = %id, column, "ignoring undecodable column: {}", e);
            None
        }
    }
}

fn parse_datetime(id: &str, column: &str, raw: Option<String>) -> DateTime<Utc> {
    raw.as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| {
            tracing::warn!(feature = %id, column, "unreadable timestamp, using epoch");
            DateTime::<Utc>::UNIX_EPOCH
        })
}
