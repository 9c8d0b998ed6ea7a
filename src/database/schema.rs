use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

/// Target schema. Foreign-key policies are declared here and enforced by
/// SQLite itself, so deleting an applicant or a parent needs no cleanup code.
pub const CURRENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS specialties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    code TEXT UNIQUE,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS applicants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fio TEXT NOT NULL,
    fio_search TEXT NOT NULL DEFAULT '',
    date_of_birth DATE NOT NULL,
    class_of_entry TEXT NOT NULL CHECK (class_of_entry IN ('9', '11')),
    specialty_id INTEGER,
    hobby TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL,
    address TEXT NOT NULL,
    email TEXT NOT NULL,
    is_guardianship BOOLEAN NOT NULL DEFAULT FALSE,
    FOREIGN KEY (specialty_id) REFERENCES specialties (id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_applicants_class_specialty
    ON applicants (class_of_entry, specialty_id);

CREATE TABLE IF NOT EXISTS parents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fio TEXT NOT NULL,
    workplace TEXT,
    phone TEXT NOT NULL,
    address TEXT,
    email TEXT
);

CREATE TABLE IF NOT EXISTS applicant_parents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    applicant_id INTEGER NOT NULL,
    parent_id INTEGER NOT NULL,
    relation_type TEXT NOT NULL DEFAULT '',
    UNIQUE (applicant_id, parent_id),
    FOREIGN KEY (applicant_id) REFERENCES applicants (id) ON DELETE CASCADE,
    FOREIGN KEY (parent_id) REFERENCES parents (id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_applicant_parents_role
    ON applicant_parents (applicant_id, relation_type);

CREATE TABLE IF NOT EXISTS health_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    applicant_id INTEGER UNIQUE,
    diseases TEXT NOT NULL DEFAULT '',
    disability BOOLEAN NOT NULL DEFAULT FALSE,
    restrictions TEXT NOT NULL DEFAULT '',
    additional_info TEXT NOT NULL DEFAULT '',
    FOREIGN KEY (applicant_id) REFERENCES applicants (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    applicant_id INTEGER NOT NULL,
    doc_type TEXT NOT NULL,
    available BOOLEAN NOT NULL DEFAULT FALSE,
    scan TEXT,
    description TEXT NOT NULL DEFAULT '',
    upload_date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (applicant_id) REFERENCES applicants (id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_documents_applicant ON documents (applicant_id);

CREATE TABLE IF NOT EXISTS contracts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number TEXT NOT NULL UNIQUE,
    date_of_conclusion DATE NOT NULL,
    payment_form TEXT NOT NULL CHECK (payment_form IN ('monthly', 'semester', 'yearly')),
    maternity_capital BOOLEAN NOT NULL DEFAULT FALSE,
    credit BOOLEAN NOT NULL DEFAULT FALSE,
    applicant_id INTEGER NOT NULL,
    customer_id INTEGER,
    FOREIGN KEY (applicant_id) REFERENCES applicants (id) ON DELETE CASCADE,
    FOREIGN KEY (customer_id) REFERENCES parents (id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_contracts_applicant ON contracts (applicant_id);

CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

#[instrument(skip(pool))]
pub async fn apply_schema(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Applying database schema");
    sqlx::raw_sql(CURRENT_SCHEMA).execute(pool).await?;
    Ok(())
}

/// Opens the pool with foreign keys enforced on every connection; the
/// cascade and set-null policies above depend on it.
#[instrument]
pub async fn connect(database_url: &str) -> Result<Pool<Sqlite>, AppError> {
    info!("Connecting to SQLite database");
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    apply_schema(&pool).await?;

    Ok(pool)
}
