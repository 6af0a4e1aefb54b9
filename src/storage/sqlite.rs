//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `PaperStorage`
//! trait using rusqlite. A connection is opened for every operation and
//! dropped when it finishes, so no transaction ever spans more than one
//! record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use super::{PaperStorage, StorageError, StorageResult, YearRange};
use crate::models::{join_authors, split_authors, Conference, Paper};

const SCHEMA_SQL: &str = r#"
create table if not exists paper
(
    id         integer primary key autoincrement,
    conference text    not null,
    year       integer not null,
    title      text    not null,
    authors    text    not null default '',
    abstract   text    not null default '',
    url        text    not null default ''
);
create index if not exists idx_paper_key on paper (conference, year, title);
"#;

const PAPER_COLUMNS: &str = "id, conference, year, title, authors, abstract, url";

/// SQLite-based paper storage.
///
/// # Schema
/// A single table:
/// - `paper`: (id, conference, year, title, authors, abstract, url)
pub struct SqliteStorage {
    /// Path to the SQLite database file
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance. Nothing is opened until the
    /// first operation.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> StorageResult<Connection> {
        Connection::open(&self.db_path).map_err(|e| {
            StorageError::ConnectionError(format!(
                "Failed to open database at {}: {e}",
                self.db_path.display()
            ))
        })
    }

    /// Rows naming a conference this build does not know are skipped.
    fn row_to_paper(row: &Row<'_>) -> rusqlite::Result<Option<Paper>> {
        let id: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        let conference = match name.parse::<Conference>() {
            Ok(conference) => conference,
            Err(e) => {
                warn!("Skipping paper {id}: {e}");
                return Ok(None);
            }
        };
        let authors: String = row.get(4)?;
        Ok(Some(Paper {
            id: Some(id),
            conference,
            year: row.get(2)?,
            title: row.get(3)?,
            authors: split_authors(&authors),
            abstract_text: row.get(5)?,
            url: row.get(6)?,
        }))
    }

    fn query_papers(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<Paper>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StorageError::QueryError(format!("Failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map(params, Self::row_to_paper)
            .map_err(|e| StorageError::QueryError(format!("Failed to iterate papers: {e}")))?;

        let mut papers = Vec::new();
        for row in rows {
            let paper = row.map_err(|e| {
                StorageError::SerializationError(format!("Failed to read paper row: {e}"))
            })?;
            papers.extend(paper);
        }
        Ok(papers)
    }

    fn update_column(&self, column: &str, id: i64, value: &str) -> StorageResult<()> {
        let conn = self.connect()?;
        let changed = conn
            .execute(
                &format!("update paper set {column} = ?1 where id = ?2"),
                params![value, id],
            )
            .map_err(|e| StorageError::QueryError(format!("Failed to update {column} of paper {id}: {e}")))?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("Paper {id} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl PaperStorage for SqliteStorage {
    async fn initialize(&mut self) -> StorageResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StorageError::SchemaError(format!("Failed to initialize schema: {e}")))
    }

    async fn insert_paper(&mut self, paper: &Paper) -> StorageResult<i64> {
        let conn = self.connect()?;
        conn.execute(
            "insert into paper (conference, year, title, authors, abstract, url) values (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                paper.conference.name(),
                paper.year,
                paper.title,
                join_authors(&paper.authors),
                paper.abstract_text,
                paper.url,
            ],
        )
        .map_err(|e| StorageError::QueryError(format!("Failed to insert paper '{}': {e}", paper.title)))?;
        Ok(conn.last_insert_rowid())
    }

    async fn find_paper(
        &self,
        conference: Conference,
        year: i32,
        title: &str,
    ) -> StorageResult<Option<Paper>> {
        let conn = self.connect()?;
        let paper = conn
            .query_row(
                &format!(
                    "select {PAPER_COLUMNS} from paper where conference = ?1 and year = ?2 and title = ?3 order by id limit 1"
                ),
                params![conference.name(), year, title],
                Self::row_to_paper,
            )
            .optional()
            .map_err(|e| StorageError::QueryError(format!("Failed to look up '{title}': {e}")))?;
        Ok(paper.flatten())
    }

    async fn update_abstract(&mut self, id: i64, abstract_text: &str) -> StorageResult<()> {
        self.update_column("abstract", id, abstract_text)
    }

    async fn update_url(&mut self, id: i64, url: &str) -> StorageResult<()> {
        self.update_column("url", id, url)
    }

    async fn get_all_papers(&self, year_range: Option<YearRange>) -> StorageResult<Vec<Paper>> {
        match year_range {
            Some(range) => self.query_papers(
                &format!("select {PAPER_COLUMNS} from paper where year between ?1 and ?2 order by id"),
                params![range.start, range.end],
            ),
            None => self.query_papers(
                &format!("select {PAPER_COLUMNS} from paper order by id"),
                [],
            ),
        }
    }

    async fn papers_missing_abstract(&self) -> StorageResult<Vec<Paper>> {
        self.query_papers(
            &format!("select {PAPER_COLUMNS} from paper where abstract = '' order by year, conference, id"),
            [],
        )
    }

    async fn years_missing_abstract(&self, conference: Conference) -> StorageResult<Vec<i32>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("select distinct year from paper where conference = ?1 and abstract = '' order by year")
            .map_err(|e| StorageError::QueryError(format!("Failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([conference.name()], |row| row.get(0))
            .map_err(|e| StorageError::QueryError(format!("Failed to iterate years for {conference}: {e}")))?;
        let mut years = Vec::new();
        for year in rows {
            years.push(year.map_err(|e| StorageError::QueryError(format!("Failed to read year row: {e}")))?);
        }
        Ok(years)
    }

    async fn count_papers(&self) -> StorageResult<usize> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row("select count(*) from paper", [], |row| row.get(0))
            .map_err(|e| StorageError::QueryError(format!("Failed to count papers: {e}")))?;
        Ok(count as usize)
    }
}
