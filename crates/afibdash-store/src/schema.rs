//! Local database schema SQL, mirroring the hosted tables.

/// Survey tables: elements and their yes/no answers.
pub const ELEMENT_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS disease_element (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    description TEXT,
    type_id INTEGER
);

CREATE TABLE IF NOT EXISTS disease_element_answers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    element_id INTEGER NOT NULL REFERENCES disease_element(id) ON DELETE CASCADE,
    answer INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_disease_element_type ON disease_element(type_id);
CREATE INDEX IF NOT EXISTS idx_answers_element ON disease_element_answers(element_id);
"#;

/// Clinical picture narratives and their AI digests.
///
/// Timestamps are RFC 3339 UTC strings with a fixed width so that text
/// ordering matches chronological ordering.
pub const CLINICAL_PICTURE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS clinical_picture (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    diagnosis TEXT,
    description TEXT,
    diagnosis_year INTEGER
);

CREATE INDEX IF NOT EXISTS idx_clinical_picture_created ON clinical_picture(created_at);

CREATE TABLE IF NOT EXISTS cp_summary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    summary TEXT NOT NULL,
    median_time_since_diagnosis_years INTEGER,
    most_cited_onset_setting TEXT,
    common_cofactor TEXT,
    highlights_json TEXT,
    source_rows INTEGER
);
"#;
