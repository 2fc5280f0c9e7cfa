use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::{postgres::PgConnection, Connection as _, Row as _};
use tracing::{debug, info, warn};

use crate::{ad_rows::AdRow, week::WeekLabel};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("error while loading report data: could not connect to the analytics database")]
    Connect(#[source] sqlx::Error),
    #[error("error while loading report data: query against {table} failed")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("error while loading report data: \"{0}\" is not a valid table name")]
    InvalidTable(String),
    #[error("error while loading report data: could not read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error while loading report data: malformed CSV row")]
    Csv(#[from] csv::Error),
}

/// Somewhere the weekly report rows can be fetched from in a single read.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn load_rows(&self) -> Result<Vec<AdRow>, LoadError>;
}

/// Reads the report table out of the analytics Postgres database.
pub struct PostgresRowSource {
    database_url: String,
    table: String,
}

impl PostgresRowSource {
    pub fn new(database_url: impl Into<String>, table: &str) -> Result<Self, LoadError> {
        if !is_valid_table_name(table) {
            return Err(LoadError::InvalidTable(table.to_owned()));
        }
        Ok(Self { database_url: database_url.into(), table: table.to_owned() })
    }

    pub fn query(&self) -> String {
        format!(
            "SELECT ads_group_nm::text AS ads_group_nm, camp_nm::text AS camp_nm, w::text AS w, \
             cpm::float8 AS cpm, impressions::int8 AS impressions FROM {}",
            self.table
        )
    }
}

#[async_trait]
impl RowSource for PostgresRowSource {
    async fn load_rows(&self) -> Result<Vec<AdRow>, LoadError> {
        let mut conn = PgConnection::connect(&self.database_url).await.map_err(LoadError::Connect)?;

        let query = self.query();
        debug!("running analytics query: {}", query);
        let result = sqlx::query(&query).fetch_all(&mut conn).await;
        if let Err(err) = conn.close().await {
            warn!("failed to close analytics connection cleanly: {}", err);
        }
        let pg_rows =
            result.map_err(|source| LoadError::Query { table: self.table.clone(), source })?;

        let rows = pg_rows
            .iter()
            .map(|row| -> Result<AdRow, sqlx::Error> {
                Ok(AdRow {
                    ads_group_nm: row.try_get("ads_group_nm")?,
                    camp_nm: row.try_get("camp_nm")?,
                    w: WeekLabel::new(row.try_get::<String, _>("w")?),
                    // missing measurements count as nothing delivered
                    cpm: row.try_get::<Option<f64>, _>("cpm")?.unwrap_or(0.0),
                    impressions: row.try_get::<Option<i64>, _>("impressions")?.unwrap_or(0),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| LoadError::Query { table: self.table.clone(), source })?;

        info!("loaded {} rows from {}", rows.len(), self.table);
        Ok(rows)
    }
}

/// Reads report rows from a CSV export with the same column names as the
/// analytics table.
pub struct CsvRowSource {
    path: PathBuf,
}

impl CsvRowSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSource for CsvRowSource {
    async fn load_rows(&self) -> Result<Vec<AdRow>, LoadError> {
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|source| LoadError::Io { path: self.path.clone(), source })?;
        let rows = parse_csv_rows(content.as_slice())?;
        info!("loaded {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }
}

pub fn parse_csv_rows(reader: impl std::io::Read) -> Result<Vec<AdRow>, LoadError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = reader.deserialize().collect::<Result<Vec<AdRow>, _>>()?;
    Ok(rows)
}

/// Accepts `table` or `schema.table`, made of ASCII letters, digits, and
/// underscores.
fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            !part.is_empty()
                && !part.starts_with(|c: char| c.is_ascii_digit())
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
