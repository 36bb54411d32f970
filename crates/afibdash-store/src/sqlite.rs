//! Local SQLite backend with the same tables as the hosted database.
//!
//! Used for development and tests. Aggregations that the hosted backend
//! runs as an RPC are plain `GROUP BY` queries here.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::info;

use crate::schema::{CLINICAL_PICTURE_SCHEMA_SQL, ELEMENT_SCHEMA_SQL};
use crate::types::*;
use afibdash_core::{ElementType, Error, Result};

/// SQLite store guarded by a single connection mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

impl SqliteStore {
    /// Open or create a database file.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Self::init(conn, Some(db_path.to_path_buf()))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        let full_schema = format!("{}\n{}", ELEMENT_SCHEMA_SQL, CLINICAL_PICTURE_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        info!(
            "SqliteStore initialized: {} clinical pictures, path={}",
            store.count_clinical_pictures()?,
            store
                .db_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".into())
        );
        Ok(store)
    }

    // ---------------------------------------------------------------
    // Disease elements
    // ---------------------------------------------------------------

    pub fn insert_element(&self, element: &NewElement) -> Result<i64> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "INSERT INTO disease_element (name, description, type_id) VALUES (?1, ?2, ?3)",
            )
            .map_err(db_err)?;
        stmt.insert(params![element.name, element.description, element.type_id.id()])
            .map_err(db_err)
    }

    pub fn delete_element(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM disease_element WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(())
    }

    pub fn list_elements(&self, element_type: ElementType) -> Result<Vec<ElementRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, name, description FROM disease_element WHERE type_id = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![element_type.id()], |row| {
                Ok(ElementRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    pub fn element_types(&self, ids: &[i64]) -> Result<Vec<ElementTypeRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, type_id FROM disease_element WHERE id IN ({})",
            placeholders(ids.len())
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(ElementTypeRow {
                    id: row.get(0)?,
                    type_id: row.get(1)?,
                })
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Answers
    // ---------------------------------------------------------------

    pub fn insert_answers(&self, answers: &[NewAnswer]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO disease_element_answers (element_id, answer) VALUES (?1, ?2)",
                )
                .map_err(db_err)?;
            for answer in answers {
                stmt.execute(params![answer.element_id, answer.answer])
                    .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)
    }

    pub fn count_answers_by_elements(&self, ids: &[i64]) -> Result<Vec<AnswerAggregate>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT element_id,
                    SUM(CASE WHEN answer THEN 1 ELSE 0 END),
                    SUM(CASE WHEN answer THEN 0 ELSE 1 END)
             FROM disease_element_answers
             WHERE element_id IN ({})
             GROUP BY element_id",
            placeholders(ids.len())
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(AnswerAggregate {
                    element_id: row.get(0)?,
                    yes: row.get::<_, i64>(1)?.max(0) as u64,
                    no: row.get::<_, i64>(2)?.max(0) as u64,
                })
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    pub fn count_answers(&self, element_type: Option<ElementType>) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = match element_type {
            Some(t) => conn.query_row(
                "SELECT COUNT(*) FROM disease_element_answers a
                 JOIN disease_element e ON e.id = a.element_id
                 WHERE e.type_id = ?1",
                params![t.id()],
                |row| row.get::<_, i64>(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM disease_element_answers", [], |row| {
                row.get::<_, i64>(0)
            }),
        }
        .map_err(db_err)?;
        Ok(count as u64)
    }

    // ---------------------------------------------------------------
    // Clinical pictures
    // ---------------------------------------------------------------

    pub fn insert_clinical_picture(&self, picture: &NewClinicalPicture) -> Result<i64> {
        self.insert_clinical_picture_at(picture, Utc::now())
    }

    /// Insert with an explicit creation time (seeding and imports).
    pub fn insert_clinical_picture_at(
        &self,
        picture: &NewClinicalPicture,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "INSERT INTO clinical_picture (created_at, diagnosis, description, diagnosis_year)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(db_err)?;
        stmt.insert(params![
            timestamp(created_at),
            picture.diagnosis,
            picture.description,
            picture.diagnosis_year
        ])
        .map_err(db_err)
    }

    /// Newest first.
    pub fn recent_clinical_pictures(&self, limit: usize) -> Result<Vec<ClinicalPictureRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, created_at, diagnosis, description, diagnosis_year
                 FROM clinical_picture
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let created_at: String = row.get(1)?;
                Ok(ClinicalPictureRow {
                    id: row.get(0)?,
                    created_at: parse_timestamp(1, &created_at)?,
                    diagnosis: row.get(2)?,
                    description: row.get(3)?,
                    diagnosis_year: row.get(4)?,
                })
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    pub fn count_clinical_pictures(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM clinical_picture", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as u64)
    }

    // ---------------------------------------------------------------
    // Summaries
    // ---------------------------------------------------------------

    pub fn insert_summary(&self, summary: &NewSummary) -> Result<()> {
        let highlights = serde_json::to_string(&summary.highlights)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cp_summary (created_at, summary, median_time_since_diagnosis_years,
                 most_cited_onset_setting, common_cofactor, highlights_json, source_rows)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                timestamp(Utc::now()),
                summary.summary,
                summary.median_time_since_diagnosis_years,
                summary.most_cited_onset_setting,
                summary.common_cofactor,
                highlights,
                summary.source_rows
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn latest_summary(&self) -> Result<Option<SummaryRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT summary, median_time_since_diagnosis_years, most_cited_onset_setting,
                    common_cofactor, highlights_json, source_rows, created_at
             FROM cp_summary
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            [],
            |row| {
                let highlights: Option<String> = row.get(4)?;
                let created_at: String = row.get(6)?;
                Ok(SummaryRow {
                    summary: row.get(0)?,
                    median_time_since_diagnosis_years: row.get(1)?,
                    most_cited_onset_setting: row.get(2)?,
                    common_cofactor: row.get(3)?,
                    highlights: highlights.and_then(|h| serde_json::from_str(&h).ok()),
                    source_rows: row.get(5)?,
                    created_at: parse_timestamp(6, &created_at)?,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }
}
