//! SQLite-backed opening book for on-demand lookups.
//!
//! Schema: `book(history TEXT, line INTEGER, jumps TEXT)`, one row per
//! recorded line, both columns in jump notation.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tripeg_core::{history_key, parse_history, Jump};

use crate::book::{MemoryBook, OpeningBook};
use crate::error::BookError;

const SCHEMA: &str = "CREATE TABLE book (
    history TEXT NOT NULL,
    line INTEGER NOT NULL,
    jumps TEXT NOT NULL,
    PRIMARY KEY (history, line)
)";

pub struct SqliteBook {
    conn: Mutex<Connection>,
}

impl SqliteBook {
    /// Open an existing book database read-only.
    pub fn open(path: &Path) -> Result<Self, BookError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        // Fail early on a file that is not a book
        conn.query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'book'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .ok_or_else(|| BookError::corrupt("database has no book table"))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Write `book` into a new database at `path`, replacing any file there.
    ///
    /// Returns the number of rows inserted.
    pub fn export(book: &MemoryBook, path: &Path) -> Result<usize, BookError> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let mut conn = Connection::open(path)?;
        conn.execute(SCHEMA, [])?;

        // Use a transaction for much faster inserts
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT INTO book (history, line, jumps) VALUES (?1, ?2, ?3)")?;
            for entry in book.entries() {
                let key = history_key(&entry.history);
                for (i, line) in entry.lines.iter().enumerate() {
                    stmt.execute(params![key, i as i64, history_key(line)])?;
                    inserted += 1;
                }
            }
        }
        tx.commit()?;

        Ok(inserted)
    }
}

impl OpeningBook for SqliteBook {
    fn lookup(&self, history: &[Jump]) -> Result<Option<Vec<Vec<Jump>>>, BookError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| BookError::corrupt("book connection poisoned"))?;

        let mut stmt = conn.prepare_cached("SELECT jumps FROM book WHERE history = ?1 ORDER BY line")?;
        let rows = stmt.query_map(params![history_key(history)], |row| row.get::<_, String>(0))?;

        let mut lines = Vec::new();
        for row in rows {
            let text = row?;
            let line = parse_history(&text)
                .map_err(|e| BookError::corrupt(format!("bad line {:?}: {}", text, e)))?;
            lines.push(line);
        }

        Ok((!lines.is_empty()).then_some(lines))
    }
}
