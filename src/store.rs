//! SQLite catalog store.
//!
//! The table layout is shared with databases produced by earlier harvesting
//! runs, so column names and types are fixed. Every write is an
//! insert-if-absent whose outcome is reported instead of raised.

use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::domain::{FetchKind, InsertOutcome, Isbn, MarcField, MarcFlag};
use crate::error::HarvestError;
use crate::resolver;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Books (
    ISBN VARCHAR NOT NULL,
    PRIMARY KEY (ISBN)
);
CREATE TABLE IF NOT EXISTS MARC21 (
    ISBN VARCHAR NOT NULL,
    tag int NOT NULL,
    code VARCHAR NOT NULL,
    value text NOT NULL,
    PRIMARY KEY (ISBN, tag, code, value)
);
CREATE TABLE IF NOT EXISTS Downloaded (
    ISBN VARCHAR NOT NULL,
    MARC21 ints,
    Blurb int,
    PRIMARY KEY (ISBN)
);
CREATE TABLE IF NOT EXISTS Blurbs (
    ISBN VARCHAR NOT NULL,
    text text NOT NULL,
    blurb_link text NOT NULL,
    PRIMARY KEY (ISBN)
);
";

/// Datafield carrying electronic location links.
pub const LINK_TAG: u16 = 856;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlurbRecord {
    pub isbn: Isbn,
    pub text: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindStatus {
    pub kind: FetchKind,
    pub candidates: usize,
    pub completed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub books: usize,
    pub marc21_found: usize,
    pub marc21_empty: usize,
    pub field_rows: usize,
    pub kinds: Vec<KindStatus>,
}

pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    pub fn open(path: &Utf8Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
            }
        }
        let conn = Connection::open(path.as_std_path())?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        tracing::debug!(path = %path, "opened catalog store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, HarvestError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Creates the catalog tables when they are missing. Existing data is kept.
    pub fn initialize(&self) -> Result<(), HarvestError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn insert_isbn(&self, isbn: &Isbn) -> Result<InsertOutcome, HarvestError> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO Books (ISBN) VALUES (?1)",
            params![isbn.as_str()],
        )?;
        Ok(InsertOutcome::from_affected(rows))
    }

    /// Loads a batch of identifiers in one transaction, returning how many were new.
    pub fn import_isbns<I>(&mut self, isbns: I) -> Result<usize, HarvestError>
    where
        I: IntoIterator<Item = Isbn>,
    {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO Books (ISBN) VALUES (?1)")?;
            for isbn in isbns {
                inserted += stmt.execute(params![isbn.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn all_isbns(&self) -> Result<Vec<Isbn>, HarvestError> {
        self.query_isbns("SELECT CAST(ISBN AS TEXT) FROM Books")
    }

    /// Identifiers carrying a completion marker for `kind`.
    pub fn completed_isbns(&self, kind: FetchKind) -> Result<Vec<Isbn>, HarvestError> {
        match kind {
            FetchKind::Marc21 => self.query_isbns("SELECT CAST(ISBN AS TEXT) FROM Downloaded"),
            FetchKind::Blurb => self.query_isbns("SELECT CAST(ISBN AS TEXT) FROM Blurbs"),
        }
    }

    /// Inserts all rows in one transaction. Reports `Inserted` when at least one
    /// row was new, `AlreadyExists` when every row was already stored.
    pub fn insert_marc_fields(&mut self, fields: &[MarcField]) -> Result<InsertOutcome, HarvestError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO MARC21 (ISBN, tag, code, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for field in fields {
                inserted += stmt.execute(params![
                    field.isbn.as_str(),
                    field.tag,
                    field.code,
                    field.value
                ])?;
            }
        }
        tx.commit()?;
        Ok(InsertOutcome::from_affected(inserted))
    }

    /// Write-once completion marker for the metadata kind.
    pub fn mark_marc_downloaded(
        &self,
        isbn: &Isbn,
        flag: MarcFlag,
    ) -> Result<InsertOutcome, HarvestError> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO Downloaded (ISBN, MARC21) VALUES (?1, ?2)",
            params![isbn.as_str(), flag.as_db()],
        )?;
        Ok(InsertOutcome::from_affected(rows))
    }

    pub fn marc_flag(&self, isbn: &Isbn) -> Result<Option<MarcFlag>, HarvestError> {
        let value: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT MARC21 FROM Downloaded WHERE ISBN = ?1",
                params![isbn.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|flag| MarcFlag::from_db(flag.unwrap_or(0))))
    }

    pub fn marc_fields(&self, isbn: &Isbn) -> Result<Vec<MarcField>, HarvestError> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(ISBN AS TEXT), CAST(tag AS TEXT), code, value FROM MARC21
             WHERE ISBN = ?1 ORDER BY tag, code, value",
        )?;
        let rows = stmt.query_map(params![isbn.as_str()], |row| {
            Ok(MarcField {
                isbn: isbn_from_row(row, 0)?,
                tag: pad_tag(row.get::<_, String>(1)?),
                code: row.get(2)?,
                value: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// First link per identifier (ascending) among 856 fields whose value
    /// matches `pattern`, ordered by identifier.
    pub fn blurb_links(&self, pattern: &Regex) -> Result<Vec<(Isbn, String)>, HarvestError> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(ISBN AS TEXT), value FROM MARC21 WHERE tag = ?1 ORDER BY ISBN, value",
        )?;
        let rows = stmt.query_map(params![LINK_TAG], |row| {
            Ok((isbn_from_row(row, 0)?, row.get::<_, String>(1)?))
        })?;

        let mut links = BTreeMap::new();
        for row in rows {
            let (isbn, value) = row?;
            if pattern.is_match(&value) {
                links.entry(isbn).or_insert(value);
            }
        }
        Ok(links.into_iter().collect())
    }

    pub fn insert_blurb(
        &self,
        isbn: &Isbn,
        text: &str,
        link: &str,
    ) -> Result<InsertOutcome, HarvestError> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO Blurbs (ISBN, text, blurb_link) VALUES (?1, ?2, ?3)",
            params![isbn.as_str(), text, link],
        )?;
        Ok(InsertOutcome::from_affected(rows))
    }

    pub fn blurb(&self, isbn: &Isbn) -> Result<Option<BlurbRecord>, HarvestError> {
        let record = self
            .conn
            .query_row(
                "SELECT CAST(ISBN AS TEXT), text, blurb_link FROM Blurbs WHERE ISBN = ?1",
                params![isbn.as_str()],
                |row| {
                    Ok(BlurbRecord {
                        isbn: isbn_from_row(row, 0)?,
                        text: row.get(1)?,
                        link: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn status(&self, link_pattern: &Regex) -> Result<StoreStatus, HarvestError> {
        let all = self.all_isbns()?;
        let marc_done = self.completed_isbns(FetchKind::Marc21)?;
        let blurb_candidates: Vec<Isbn> = self
            .blurb_links(link_pattern)?
            .into_iter()
            .map(|(isbn, _)| isbn)
            .collect();
        let blurb_done = self.completed_isbns(FetchKind::Blurb)?;

        let marc21_found = self.count("SELECT COUNT(*) FROM Downloaded WHERE MARC21 = 1")?;
        let marc21_empty = self.count("SELECT COUNT(*) FROM Downloaded WHERE MARC21 = 0")?;
        let field_rows = self.count("SELECT COUNT(*) FROM MARC21")?;

        let kinds = vec![
            KindStatus {
                kind: FetchKind::Marc21,
                candidates: all.len(),
                completed: marc_done.len(),
                pending: resolver::pending(all.iter().cloned(), marc_done).len(),
            },
            KindStatus {
                kind: FetchKind::Blurb,
                candidates: blurb_candidates.len(),
                completed: blurb_done.len(),
                pending: resolver::pending(blurb_candidates, blurb_done).len(),
            },
        ];

        Ok(StoreStatus {
            books: all.len(),
            marc21_found,
            marc21_empty,
            field_rows,
            kinds,
        })
    }

    fn query_isbns(&self, sql: &str) -> Result<Vec<Isbn>, HarvestError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| isbn_from_row(row, 0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count(&self, sql: &str) -> Result<usize, HarvestError> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn isbn_from_row(row: &Row, idx: usize) -> rusqlite::Result<Isbn> {
    Ok(Isbn::from_stored(row.get(idx)?))
}

// The `tag` column has integer affinity, so "020" comes back as "20".
fn pad_tag(tag: String) -> String {
    if !tag.is_empty() && tag.len() < 3 && tag.chars().all(|ch| ch.is_ascii_digit()) {
        format!("{tag:0>3}")
    } else {
        tag
    }
}
