//! Per-file audit history.
//!
//! Each file carries an append-only log of structural and content events,
//! persisted as a JSON array in `files.history`. Appends are read-modify-write
//! and must run on the same transaction as the mutation they record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::datetime;
use crate::{ArborError, Result};

/// What happened to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum HistoryEvent {
    /// File created inside a directory.
    #[serde(rename_all = "camelCase")]
    Created {
        name: String,
        directory_id: String,
    },
    /// Display name changed.
    Renamed { from: String, to: String },
    /// Ancestor path changed, either by moving the file or one of its ancestors.
    #[serde(rename_all = "camelCase")]
    Moved {
        directory_id: String,
        ancestors: Vec<String>,
    },
    /// New content version appended.
    #[serde(rename_all = "camelCase")]
    VersionAdded {
        version_id: String,
        key: String,
        size: i64,
    },
    /// File tombstoned.
    Deleted {},
}

/// A history event with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub event: HistoryEvent,
    pub date: DateTime<Utc>,
}

/// Append-only sequence of history records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<HistoryRecord>);

impl History {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` at `date`.
    pub fn append(&mut self, event: HistoryEvent, date: DateTime<Utc>) {
        self.0.push(HistoryRecord { event, date });
    }

    /// Records, oldest first.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.0
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&HistoryRecord> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON encoding stored in `files.history`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ArborError::Database(format!("history encode error: {e}")))
    }
}

impl TryFrom<String> for History {
    type Error = serde_json::Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        serde_json::from_str(&value)
    }
}

/// Append `event` to a file's history.
///
/// Reads the current log and writes it back on `conn`; callers pass the
/// transaction of the mutation being recorded so concurrent appends to the
/// same file serialize on it.
pub async fn append(conn: &mut SqliteConnection, file_id: &str, event: HistoryEvent) -> Result<()> {
    let raw: Option<String> = sqlx::query_scalar("SELECT history FROM files WHERE id = ?")
        .bind(file_id)
        .fetch_optional(&mut *conn)
        .await?;
    let raw = raw.ok_or_else(|| ArborError::NotFound("file".to_string()))?;

    let mut history = History::try_from(raw)
        .map_err(|e| ArborError::Database(format!("history decode error: {e}")))?;
    history.append(event, Utc::now());

    sqlx::query("UPDATE files SET history = ?, updated_at = ? WHERE id = ?")
        .bind(history.to_json()?)
        .bind(datetime::now_db())
        .bind(file_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, secs).unwrap()
    }

    #[test]
    fn test_event_wire_shape() {
        let mut history = History::new();
        history.append(
            HistoryEvent::Renamed {
                from: "a.txt".to_string(),
                to: "b.txt".to_string(),
            },
            at(0),
        );

        let json: serde_json::Value = serde_json::from_str(&history.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["action"], "renamed");
        assert_eq!(json[0]["from"], "a.txt");
        assert_eq!(json[0]["to"], "b.txt");
        assert!(json[0]["date"].is_string());
    }

    #[test]
    fn test_kebab_case_actions() {
        let mut history = History::new();
        history.append(
            HistoryEvent::VersionAdded {
                version_id: "v1".to_string(),
                key: "k".to_string(),
                size: 3,
            },
            at(0),
        );
        history.append(HistoryEvent::Deleted {}, at(1));

        let json: serde_json::Value = serde_json::from_str(&history.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["action"], "version-added");
        assert_eq!(json[0]["versionId"], "v1");
        assert_eq!(json[1]["action"], "deleted");
    }

    #[test]
    fn test_decode_roundtrip_preserves_order() {
        let mut history = History::new();
        history.append(
            HistoryEvent::Created {
                name: "a".to_string(),
                directory_id: "d".to_string(),
            },
            at(0),
        );
        history.append(
            HistoryEvent::Moved {
                directory_id: "e".to_string(),
                ancestors: vec!["r".to_string(), "e".to_string()],
            },
            at(1),
        );

        let decoded = History::try_from(history.to_json().unwrap()).unwrap();
        assert_eq!(decoded, history);
        assert_eq!(decoded.len(), 2);
        assert!(matches!(
            decoded.last().unwrap().event,
            HistoryEvent::Moved { .. }
        ));
    }

    #[test]
    fn test_empty_history_decodes() {
        let history = History::try_from("[]".to_string()).unwrap();
        assert!(history.is_empty());
    }
}
