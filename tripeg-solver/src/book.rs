//! Opening book: recorded best lines for early positions.
//!
//! Binary format:
//! - Header (32 bytes):
//!   - Magic: "TPB1" (4 bytes)
//!   - Version: u32 LE (4 bytes)
//!   - Entry count: u64 LE (8 bytes)
//!   - Checksum: u64 LE xxhash of data section (8 bytes)
//!   - Reserved: 8 bytes (zeros)
//! - Data section, per entry:
//!   - History length: u8, then one packed jump byte per history jump
//!   - Line count: u16 LE
//!   - Per line: length u8, then one packed jump byte per jump
//!
//! Entries are sorted by history key.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tripeg_core::{history_key, Board, Jump, PackedJump, MAX_JUMPS};
use xxhash_rust::xxh64::xxh64;

use crate::error::BookError;
use crate::solver::Solver;
use crate::sqlite::SqliteBook;

/// Histories up to this length consult the book.
pub const BOOK_DEPTH: usize = 3;

const MAGIC: &[u8; 4] = b"TPB1";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;

/// Read access to recorded best lines.
///
/// `lookup` returns full paths (the history followed by a best continuation).
/// `Ok(None)` is a miss; an `Err` means the book itself is unusable.
pub trait OpeningBook: Send + Sync {
    fn lookup(&self, history: &[Jump]) -> Result<Option<Vec<Vec<Jump>>>, BookError>;
}

/// A book entry: one position's history and its recorded best lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookEntry {
    pub history: Vec<Jump>,
    pub lines: Vec<Vec<Jump>>,
}

/// In-memory opening book with binary persistence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryBook {
    entries: BTreeMap<String, BookEntry>,
}

impl MemoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the best lines for a history, replacing any previous entry.
    pub fn insert(&mut self, history: Vec<Jump>, lines: Vec<Vec<Jump>>) {
        self.entries
            .insert(history_key(&history), BookEntry { history, lines });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in history key order.
    pub fn entries(&self) -> impl Iterator<Item = &BookEntry> {
        self.entries.values()
    }

    /// Save the book to a binary file.
    pub fn save(&self, path: &Path) -> Result<usize, BookError> {
        let count = self.entries.len();

        // Build data section
        let mut data = Vec::new();
        for entry in self.entries.values() {
            encode_jumps(&mut data, &entry.history)?;
            let lines = u16::try_from(entry.lines.len())
                .map_err(|_| BookError::corrupt("too many lines for one history"))?;
            data.extend_from_slice(&lines.to_le_bytes());
            for line in &entry.lines {
                encode_jumps(&mut data, line)?;
            }
        }

        // Compute checksum
        let checksum = xxh64(&data, 0);

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Header
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(count as u64).to_le_bytes())?;
        writer.write_all(&checksum.to_le_bytes())?;
        writer.write_all(&[0u8; 8])?; // Reserved

        // Data
        writer.write_all(&data)?;
        writer.flush()?;

        Ok(count)
    }

    /// Load a book from a binary file.
    pub fn load(path: &Path) -> Result<Self, BookError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(BookError::corrupt("invalid book magic"));
        }

        let version = u32::from_le_bytes(read_array(&header[4..8])?);
        if version != VERSION {
            return Err(BookError::corrupt(format!(
                "unsupported book version: {}",
                version
            )));
        }

        let count = u64::from_le_bytes(read_array(&header[8..16])?);
        let stored_checksum = u64::from_le_bytes(read_array(&header[16..24])?);

        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        if xxh64(&data, 0) != stored_checksum {
            return Err(BookError::corrupt("book checksum mismatch"));
        }

        let mut cursor = Cursor { data: &data, pos: 0 };
        let mut book = MemoryBook::new();
        for _ in 0..count {
            let history = cursor.jumps()?;
            let line_count = u16::from_le_bytes(cursor.array()?);
            let mut lines = Vec::with_capacity(line_count as usize);
            for _ in 0..line_count {
                lines.push(cursor.jumps()?);
            }
            book.insert(history, lines);
        }

        if cursor.pos != data.len() {
            return Err(BookError::corrupt("trailing bytes after last entry"));
        }

        Ok(book)
    }
}

impl OpeningBook for MemoryBook {
    fn lookup(&self, history: &[Jump]) -> Result<Option<Vec<Vec<Jump>>>, BookError> {
        Ok(self
            .entries
            .get(&history_key(history))
            .map(|entry| entry.lines.clone()))
    }
}

fn encode_jumps(data: &mut Vec<u8>, jumps: &[Jump]) -> Result<(), BookError> {
    let len = u8::try_from(jumps.len())
        .map_err(|_| BookError::corrupt("line longer than 255 jumps"))?;
    data.push(len);
    for jump in jumps {
        let packed = jump
            .pack()
            .ok_or_else(|| BookError::corrupt(format!("{} is not a board jump", jump)))?;
        data.push(packed.0);
    }
    Ok(())
}

fn read_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], BookError> {
    bytes
        .try_into()
        .map_err(|_| BookError::corrupt("truncated book"))
}

/// Bounds-checked reader over the data section.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], BookError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or_else(|| BookError::corrupt("truncated book entry"))?;
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BookError> {
        read_array(self.take(N)?)
    }

    fn jumps(&mut self) -> Result<Vec<Jump>, BookError> {
        let [len] = self.array::<1>()?;
        self.take(len as usize)?
            .iter()
            .map(|&idx| {
                if (idx as usize) < MAX_JUMPS {
                    Ok(PackedJump(idx).unpack())
                } else {
                    Err(BookError::corrupt(format!("jump index {} out of range", idx)))
                }
            })
            .collect()
    }
}

/// Open a book file: `.db` selects SQLite, anything else the binary format.
pub fn open(path: &Path) -> Result<Arc<dyn OpeningBook>, BookError> {
    if path.extension().is_some_and(|ext| ext == "db") {
        Ok(Arc::new(SqliteBook::open(path)?))
    } else {
        Ok(Arc::new(MemoryBook::load(path)?))
    }
}

/// Build a book for every history of length `0..=depth` from the standard
/// start.
///
/// Each non-terminal position records one full best path per distinct next
/// jump that reaches the position's best score. Returns None if `running`
/// is cleared.
pub fn build_book(depth: usize, running: &AtomicBool) -> Option<MemoryBook> {
    let mut book = MemoryBook::new();
    let mut solver = Solver::new();
    let mut frontier = vec![Board::standard()];

    for level in 0..=depth {
        let mut next = Vec::new();
        for board in &frontier {
            let mut best: Option<u8> = None;
            let mut lines: Vec<Vec<Jump>> = Vec::new();

            for jump in board.legal_moves().jumps() {
                let mut child = board.clone();
                if child.apply_jump(jump).is_err() {
                    continue;
                }
                let outcome = solver.solve(&child, running)?;
                match best {
                    Some(score) if outcome.best_score > score => {}
                    Some(score) if outcome.best_score == score => lines.push(outcome.best_path),
                    _ => {
                        best = Some(outcome.best_score);
                        lines = vec![outcome.best_path];
                    }
                }
                if level < depth {
                    next.push(child);
                }
            }

            if !lines.is_empty() {
                book.insert(board.history(), lines);
            }
        }

        tracing::info!(
            depth = level,
            positions = frontier.len(),
            entries = book.len(),
            "book level complete"
        );
        frontier = next;
    }

    Some(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripeg_core::{Hole, Vector};

    fn jump(x: i8, y: i8, dx: i8, dy: i8) -> Jump {
        Jump::new(Hole(x, y), Vector(dx, dy))
    }

    fn sample_book() -> MemoryBook {
        let mut book = MemoryBook::new();
        book.insert(vec![], vec![vec![jump(2, 4, 2, 4)], vec![jump(6, 4, -2, 4)]]);
        book.insert(
            vec![jump(2, 4, 2, 4)],
            vec![vec![jump(2, 4, 2, 4), jump(0, 0, 2, 4)]],
        );
        book
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let book = sample_book();
        let lines = book.lookup(&[]).unwrap().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(book.lookup(&[jump(6, 4, -2, 4)]).unwrap(), None);
    }

    #[test]
    fn test_book_roundtrip() {
        let path = std::env::temp_dir().join("tripeg_test_book_roundtrip.bin");

        let book = sample_book();
        let saved = book.save(&path).unwrap();
        assert_eq!(saved, 2);

        let loaded = MemoryBook::load(&path).unwrap();
        assert_eq!(loaded, book);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let path = std::env::temp_dir().join("tripeg_test_book_magic.bin");
        std::fs::write(&path, [0u8; HEADER_SIZE]).unwrap();
        assert!(matches!(
            MemoryBook::load(&path),
            Err(BookError::Corrupt { .. })
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_rejects_checksum_mismatch() {
        let path = std::env::temp_dir().join("tripeg_test_book_checksum.bin");
        sample_book().save(&path).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            MemoryBook::load(&path),
            Err(BookError::Corrupt { .. })
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("tripeg_test_book_missing.bin");
        assert!(matches!(MemoryBook::load(&path), Err(BookError::Io { .. })));
    }

    #[test]
    fn test_save_rejects_unknown_jump() {
        let path = std::env::temp_dir().join("tripeg_test_book_unknown.bin");
        let mut book = MemoryBook::new();
        book.insert(vec![], vec![vec![jump(4, 4, 4, 0)]]);
        assert!(matches!(book.save(&path), Err(BookError::Corrupt { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_build_book_depth_one() {
        let running = AtomicBool::new(true);
        let book = build_book(1, &running).unwrap();

        // Root plus one entry per opening jump.
        assert_eq!(book.len(), 3);
        for entry in book.entries() {
            assert!(!entry.lines.is_empty());
            for line in &entry.lines {
                assert!(line.starts_with(&entry.history));
                let mut board = Board::standard();
                for &j in line {
                    board.apply_jump(j).unwrap();
                }
                assert!(board.is_terminal());
                assert_eq!(board.peg_count(), 1);
            }
        }
    }

    #[test]
    fn test_build_book_interrupted() {
        let running = AtomicBool::new(false);
        assert_eq!(build_book(2, &running), None);
    }
}
