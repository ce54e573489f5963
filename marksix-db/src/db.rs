use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::dataset::Dataset;
use crate::models::{BALLS_PER_DRAW, DrawRecord, RecordError, Zodiac};

/// Logical name of the dataset the scraper maintains.
pub const DEFAULT_DATASET: &str = "draw-records";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS datasets (
    name        TEXT PRIMARY KEY,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS draws (
    dataset     TEXT NOT NULL,
    seq         INTEGER NOT NULL,
    period      TEXT NOT NULL,
    number_1    INTEGER NOT NULL,
    number_2    INTEGER NOT NULL,
    number_3    INTEGER NOT NULL,
    number_4    INTEGER NOT NULL,
    number_5    INTEGER NOT NULL,
    number_6    INTEGER NOT NULL,
    number_7    INTEGER NOT NULL,
    zodiac_1    TEXT NOT NULL,
    zodiac_2    TEXT NOT NULL,
    zodiac_3    TEXT NOT NULL,
    zodiac_4    TEXT NOT NULL,
    zodiac_5    TEXT NOT NULL,
    zodiac_6    TEXT NOT NULL,
    zodiac_7    TEXT NOT NULL,
    PRIMARY KEY (dataset, seq),
    UNIQUE (dataset, period)
);
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("没有数据集 '{name}'，请先运行 update 或 import")]
    NotFound { name: String },
    #[error("数据集第 {row} 行 (期数 {period}) 已损坏 : {source}")]
    Corrupt {
        row: usize,
        period: String,
        source: RecordError,
    },
    #[error("无法创建目录 {path:?} : {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub fn db_path() -> PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("marksix.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(Connection::open(path)?)
}

pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Replaces every stored row of `name` with `dataset`, in one transaction.
/// Returns the number of rows written.
pub fn save_dataset(conn: &Connection, name: &str, dataset: &Dataset) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO datasets (name, updated_at) VALUES (?1, datetime('now'))
         ON CONFLICT(name) DO UPDATE SET updated_at = excluded.updated_at",
        params![name],
    )?;
    tx.execute("DELETE FROM draws WHERE dataset = ?1", params![name])?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO draws (dataset, seq, period,
                number_1, number_2, number_3, number_4, number_5, number_6, number_7,
                zodiac_1, zodiac_2, zodiac_3, zodiac_4, zodiac_5, zodiac_6, zodiac_7)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )?;
        for (seq, r) in dataset.records().iter().enumerate() {
            let n = &r.numbers;
            let z = &r.zodiacs;
            stmt.execute(params![
                name,
                seq as i64,
                r.period,
                n[0],
                n[1],
                n[2],
                n[3],
                n[4],
                n[5],
                n[6],
                z[0].label(),
                z[1].label(),
                z[2].label(),
                z[3].label(),
                z[4].label(),
                z[5].label(),
                z[6].label(),
            ])?;
        }
    }

    tx.commit()?;
    debug!(dataset = name, rows = dataset.len(), "dataset saved");
    Ok(dataset.len())
}

pub fn dataset_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM datasets WHERE name = ?1", params![name], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub fn load_dataset(conn: &Connection, name: &str) -> Result<Dataset, StoreError> {
    if !dataset_exists(conn, name)? {
        return Err(StoreError::NotFound {
            name: name.to_string(),
        });
    }

    let mut stmt = conn.prepare(
        "SELECT period,
                number_1, number_2, number_3, number_4, number_5, number_6, number_7,
                zodiac_1, zodiac_2, zodiac_3, zodiac_4, zodiac_5, zodiac_6, zodiac_7
         FROM draws WHERE dataset = ?1 ORDER BY seq",
    )?;
    let rows = stmt
        .query_map(params![name], |row| {
            let period: String = row.get(0)?;
            let mut numbers = [0u8; BALLS_PER_DRAW];
            for (i, n) in numbers.iter_mut().enumerate() {
                *n = row.get(1 + i)?;
            }
            let mut zodiacs: [String; BALLS_PER_DRAW] = Default::default();
            for (i, z) in zodiacs.iter_mut().enumerate() {
                *z = row.get(1 + BALLS_PER_DRAW + i)?;
            }
            Ok((period, numbers, zodiacs))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(rows.len());
    for (row, (period, numbers, labels)) in rows.into_iter().enumerate() {
        let record = parse_row(&period, numbers, &labels).map_err(|source| StoreError::Corrupt {
            row: row + 1,
            period: period.clone(),
            source,
        })?;
        records.push(record);
    }

    debug!(dataset = name, rows = records.len(), "dataset loaded");
    Ok(Dataset::from_records(records))
}

fn parse_row(
    period: &str,
    numbers: [u8; BALLS_PER_DRAW],
    labels: &[String; BALLS_PER_DRAW],
) -> Result<DrawRecord, RecordError> {
    let mut zodiacs = [Zodiac::Rat; BALLS_PER_DRAW];
    for (z, label) in zodiacs.iter_mut().zip(labels) {
        *z = label.parse()?;
    }
    DrawRecord::new(period, numbers, zodiacs)
}

pub fn count_draws(conn: &Connection, name: &str) -> Result<u32, StoreError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM draws WHERE dataset = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count)
}
