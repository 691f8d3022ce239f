//! Triangular peg solitaire board model with bit-packed occupancy.
//!
//! # Board Encoding (16-bit)
//!
//! ```text
//! Bit i set  <=>  hole i holds a peg (bit 15 unused)
//!
//! Hole indices (x, y), apex on top:
//!
//!                      14=(4,8)
//!                 12=(3,6)  13=(5,6)
//!             9=(2,4)  10=(4,4)  11=(6,4)
//!         5=(1,2)   6=(3,2)   7=(5,2)   8=(7,2)
//!     0=(0,0)   1=(2,0)   2=(4,0)   3=(6,0)   4=(8,0)
//! ```
//!
//! # Jump Encoding (8-bit)
//!
//! ```text
//! PackedJump = index (0-35) into the jump table.
//! The table lists the topology vectors hole by hole, in hole order,
//! keeping each hole's vector order.
//! ```

mod error;
mod event;

pub use error::{ParseJumpError, PegError};
pub use event::{EventSink, GameEvent};

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Number of holes on the board.
pub const HOLE_COUNT: usize = 15;

/// Number of (hole, vector) pairs in the topology table.
pub const MAX_JUMPS: usize = 36;

/// Mask with one bit per hole.
pub const FULL_BOARD: u16 = (1 << HOLE_COUNT) - 1;

/// The hole left empty in the standard starting configuration.
pub const APEX: Hole = Hole(4, 8);

/// All holes in board key order. This order fixes bit positions, jump
/// table layout and search iteration order.
pub const HOLES: [Hole; HOLE_COUNT] = [
    Hole(0, 0),
    Hole(2, 0),
    Hole(4, 0),
    Hole(6, 0),
    Hole(8, 0),
    Hole(1, 2),
    Hole(3, 2),
    Hole(5, 2),
    Hole(7, 2),
    Hole(2, 4),
    Hole(4, 4),
    Hole(6, 4),
    Hole(3, 6),
    Hole(5, 6),
    Hole(4, 8),
];

/// Candidate jump vectors per hole, indexed like [`HOLES`].
#[rustfmt::skip]
const TOPOLOGY: [&[Vector]; HOLE_COUNT] = [
    &[Vector(4, 0), Vector(2, 4)],                                    // (0,0)
    &[Vector(4, 0), Vector(2, 4)],                                    // (2,0)
    &[Vector(-4, 0), Vector(4, 0), Vector(2, 4), Vector(-2, 4)],      // (4,0)
    &[Vector(-4, 0), Vector(-2, 4)],                                  // (6,0)
    &[Vector(-4, 0), Vector(-2, 4)],                                  // (8,0)
    &[Vector(4, 0), Vector(2, 4)],                                    // (1,2)
    &[Vector(4, 0), Vector(2, 4)],                                    // (3,2)
    &[Vector(-4, 0), Vector(-2, 4)],                                  // (5,2)
    &[Vector(-4, 0), Vector(-2, 4)],                                  // (7,2)
    &[Vector(4, 0), Vector(2, 4), Vector(-2, -4), Vector(2, -4)],     // (2,4)
    &[Vector(-2, -4), Vector(2, -4)],                                 // (4,4)
    &[Vector(-4, 0), Vector(-2, 4), Vector(-2, -4), Vector(2, -4)],   // (6,4)
    &[Vector(-2, -4), Vector(2, -4)],                                 // (3,6)
    &[Vector(-2, -4), Vector(2, -4)],                                 // (5,6)
    &[Vector(-2, -4), Vector(2, -4)],                                 // (4,8)
];

/// Candidate vectors for a hole, in table order. Empty for non-holes.
pub fn topology(hole: Hole) -> &'static [Vector] {
    match hole.index() {
        Some(idx) => TOPOLOGY[idx],
        None => &[],
    }
}

// ============================================================================
// COORDINATES
// ============================================================================

/// A hole coordinate on the 2-unit triangular grid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Hole(pub i8, pub i8);

impl Hole {
    #[inline]
    pub const fn x(self) -> i8 {
        self.0
    }

    #[inline]
    pub const fn y(self) -> i8 {
        self.1
    }

    /// Position of this hole in [`HOLES`], or None if it is off the board.
    #[inline]
    pub fn index(self) -> Option<usize> {
        HOLES.iter().position(|&h| h == self)
    }

    /// Hole at the given index (0-14).
    #[inline]
    pub fn from_index(idx: usize) -> Option<Hole> {
        HOLES.get(idx).copied()
    }

    /// Translate by a vector. None on coordinate overflow.
    #[inline]
    pub fn offset(self, v: Vector) -> Option<Hole> {
        Some(Hole(self.0.checked_add(v.0)?, self.1.checked_add(v.1)?))
    }

    /// Iterate over all 15 holes in board key order.
    pub fn all() -> impl Iterator<Item = Hole> {
        HOLES.into_iter()
    }
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

/// A jump vector: two hole-spacings in one of the six triangular directions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Vector(pub i8, pub i8);

impl Vector {
    /// The single-spacing step to the jumped-over hole.
    #[inline]
    pub const fn half(self) -> Vector {
        Vector(self.0 / 2, self.1 / 2)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

/// A move record: the peg at `origin` jumps along `vector`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Jump {
    pub origin: Hole,
    pub vector: Vector,
}

impl Jump {
    #[inline]
    pub const fn new(origin: Hole, vector: Vector) -> Jump {
        Jump { origin, vector }
    }

    /// The hole jumped over (origin + vector / 2).
    #[inline]
    pub fn midpoint(&self) -> Option<Hole> {
        self.origin.offset(self.vector.half())
    }

    /// The landing hole (origin + vector).
    #[inline]
    pub fn endpoint(&self) -> Option<Hole> {
        self.origin.offset(self.vector)
    }

    /// Index of this jump in the jump table, if the topology lists it.
    pub fn pack(self) -> Option<PackedJump> {
        let table = &*JUMP_TABLE;
        let idx = self.origin.index()?;
        let start = table.first[idx] as usize;
        let end = table.first[idx + 1] as usize;
        (start..end)
            .find(|&i| table.jumps[i].jump.vector == self.vector)
            .map(|i| PackedJump(i as u8))
    }
}

impl fmt::Display for Jump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.origin, self.vector)
    }
}

impl FromStr for Jump {
    type Err = ParseJumpError;

    /// Parse `(x,y)+(dx,dy)`; whitespace anywhere is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let (origin, vector) = compact
            .split_once(")+(")
            .ok_or_else(|| ParseJumpError::new(s))?;
        let origin = origin.strip_prefix('(').ok_or_else(|| ParseJumpError::new(s))?;
        let vector = vector.strip_suffix(')').ok_or_else(|| ParseJumpError::new(s))?;

        let parse_pair = |pair: &str| -> Option<(i8, i8)> {
            let (a, b) = pair.split_once(',')?;
            Some((a.parse().ok()?, b.parse().ok()?))
        };
        let (x, y) = parse_pair(origin).ok_or_else(|| ParseJumpError::new(s))?;
        let (dx, dy) = parse_pair(vector).ok_or_else(|| ParseJumpError::new(s))?;
        Ok(Jump::new(Hole(x, y), Vector(dx, dy)))
    }
}

/// Canonical, order-preserving serialization of a move history.
///
/// Jumps are joined by single spaces; the empty history is `""`.
pub fn history_key(history: &[Jump]) -> String {
    history
        .iter()
        .map(Jump::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a whitespace-separated list of jumps (the inverse of [`history_key`]).
pub fn parse_history(s: &str) -> Result<Vec<Jump>, ParseJumpError> {
    let mut jumps = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c.is_whitespace() && current.ends_with(')') && current.contains('+') {
            jumps.push(current.parse()?);
            current.clear();
        } else if !c.is_whitespace() {
            current.push(c);
        }
    }
    if !current.is_empty() {
        jumps.push(current.parse()?);
    }
    Ok(jumps)
}

/// The move to display next: `path[history_len]`.
pub fn best_move(path: &[Jump], history_len: usize) -> Result<Jump, PegError> {
    path.get(history_len)
        .copied()
        .ok_or(PegError::NoMoveAvailable {
            history_len,
            path_len: path.len(),
        })
}

// ============================================================================
// JUMP TABLE - precomputed geometry for every topology entry
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct JumpGeometry {
    jump: Jump,
    origin: u8,
    midpoint: u8,
    endpoint: u8,
}

struct JumpTable {
    jumps: Vec<JumpGeometry>,
    /// `first[i]..first[i + 1]` is hole i's slice of `jumps`.
    first: [u8; HOLE_COUNT + 1],
}

impl JumpTable {
    fn build() -> JumpTable {
        let mut jumps = Vec::with_capacity(MAX_JUMPS);
        let mut first = [0u8; HOLE_COUNT + 1];

        for (idx, (&hole, vectors)) in HOLES.iter().zip(TOPOLOGY.iter()).enumerate() {
            for &vector in vectors.iter() {
                let jump = Jump::new(hole, vector);
                let midpoint = jump
                    .midpoint()
                    .and_then(Hole::index)
                    .expect("topology midpoint must be a hole");
                let endpoint = jump
                    .endpoint()
                    .and_then(Hole::index)
                    .expect("topology endpoint must be a hole");
                jumps.push(JumpGeometry {
                    jump,
                    origin: idx as u8,
                    midpoint: midpoint as u8,
                    endpoint: endpoint as u8,
                });
            }
            first[idx + 1] = jumps.len() as u8;
        }

        debug_assert_eq!(jumps.len(), MAX_JUMPS);
        JumpTable { jumps, first }
    }
}

static JUMP_TABLE: LazyLock<JumpTable> = LazyLock::new(JumpTable::build);

// ============================================================================
// PACKED TYPES - allocation-free jump handling for search
// ============================================================================

/// Packed jump: an index into the jump table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedJump(pub u8);

impl PackedJump {
    #[inline]
    fn geometry(self) -> JumpGeometry {
        JUMP_TABLE.jumps[self.0 as usize]
    }

    /// Convert back to a [`Jump`].
    #[inline]
    pub fn unpack(self) -> Jump {
        self.geometry().jump
    }

    /// Whether the index is inside the jump table.
    #[inline]
    pub fn is_valid(self) -> bool {
        (self.0 as usize) < MAX_JUMPS
    }

    /// Bits that flip when this jump is applied or undone.
    #[inline]
    fn mask(self) -> u16 {
        let g = self.geometry();
        (1 << g.origin) | (1 << g.midpoint) | (1 << g.endpoint)
    }
}

impl fmt::Debug for PackedJump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "PackedJump({} = {})", self.0, self.unpack())
        } else {
            write!(f, "PackedJump({} = invalid)", self.0)
        }
    }
}

/// A fixed-size jump list that avoids heap allocation.
#[derive(Clone, Copy)]
pub struct JumpList {
    jumps: [PackedJump; MAX_JUMPS],
    len: u8,
}

impl JumpList {
    #[inline]
    pub const fn new() -> JumpList {
        JumpList {
            jumps: [PackedJump(0); MAX_JUMPS],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, jump: PackedJump) {
        debug_assert!((self.len as usize) < MAX_JUMPS);
        self.jumps[self.len as usize] = jump;
        self.len += 1;
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn get(&self, idx: usize) -> PackedJump {
        self.jumps[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = PackedJump> + '_ {
        self.jumps[..self.len as usize].iter().copied()
    }
}

impl Default for JumpList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JumpList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Legal jumps grouped by origin, origins in board key order and vectors in
/// topology order.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct LegalMoves {
    entries: Vec<(Hole, Vec<Vector>)>,
}

impl LegalMoves {
    /// True when no peg can move (terminal board).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of origins with at least one legal jump.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total number of legal jumps.
    pub fn jump_count(&self) -> usize {
        self.entries.iter().map(|(_, v)| v.len()).sum()
    }

    /// Legal vectors from one origin.
    pub fn get(&self, origin: Hole) -> Option<&[Vector]> {
        self.entries
            .iter()
            .find(|(hole, _)| *hole == origin)
            .map(|(_, vectors)| vectors.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Hole, &[Vector])> + '_ {
        self.entries.iter().map(|(hole, v)| (*hole, v.as_slice()))
    }

    /// Flattened jumps in iteration order.
    pub fn jumps(&self) -> impl Iterator<Item = Jump> + '_ {
        self.entries
            .iter()
            .flat_map(|(hole, vectors)| vectors.iter().map(move |&v| Jump::new(*hole, v)))
    }
}

// ============================================================================
// BOARD
// ============================================================================

/// Board occupancy plus the move history that produced it.
///
/// The history doubles as the undo stack and as the path reported by search.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Board {
    /// Current occupancy (see module docs).
    pegs: u16,
    /// Tracked peg count; always equals `pegs.count_ones()`.
    peg_count: u8,
    /// Occupancy restored by `restart()`.
    start: u16,
    history: Vec<PackedJump>,
}

impl Board {
    /// Build a board from an explicit occupancy map.
    ///
    /// The keys must be exactly the 15 fixed holes, each listed once.
    pub fn new<I>(occupancy: I) -> Result<Board, PegError>
    where
        I: IntoIterator<Item = (Hole, bool)>,
    {
        let mut seen = [false; HOLE_COUNT];
        let mut bits = 0u16;

        for (hole, occupied) in occupancy {
            let idx = hole.index().ok_or_else(|| PegError::InvalidTopology {
                reason: format!("{} is not a board hole", hole),
            })?;
            if seen[idx] {
                return Err(PegError::InvalidTopology {
                    reason: format!("{} listed more than once", hole),
                });
            }
            seen[idx] = true;
            if occupied {
                bits |= 1 << idx;
            }
        }

        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(PegError::InvalidTopology {
                reason: format!("{} is missing", HOLES[missing]),
            });
        }

        Ok(Board::from_bits(bits))
    }

    /// Standard start: every hole filled except the apex, 14 pegs.
    pub fn standard() -> Board {
        Board::from_bits(FULL_BOARD & !(1 << (HOLE_COUNT - 1)))
    }

    /// Start with every hole filled except `empty`.
    pub fn with_empty_hole(empty: Hole) -> Result<Board, PegError> {
        let idx = empty.index().ok_or_else(|| PegError::InvalidTopology {
            reason: format!("{} is not a board hole", empty),
        })?;
        Ok(Board::from_bits(FULL_BOARD & !(1 << idx)))
    }

    /// Build from a raw occupancy mask. Bits above the 15 holes are rejected.
    pub fn from_occupancy(bits: u16) -> Result<Board, PegError> {
        if bits & !FULL_BOARD != 0 {
            return Err(PegError::InvalidTopology {
                reason: format!("occupancy {:#06x} has bits outside the board", bits),
            });
        }
        Ok(Board::from_bits(bits))
    }

    fn from_bits(bits: u16) -> Board {
        Board {
            pegs: bits,
            peg_count: bits.count_ones() as u8,
            start: bits,
            history: Vec::with_capacity(HOLE_COUNT),
        }
    }

    /// Raw occupancy: bit i set iff hole i has a peg.
    #[inline]
    pub fn occupancy(&self) -> u16 {
        self.pegs
    }

    /// Occupancy this board restarts to.
    #[inline]
    pub fn starting_occupancy(&self) -> u16 {
        self.start
    }

    #[inline]
    pub fn peg_count(&self) -> u8 {
        self.peg_count
    }

    /// Whether a hole holds a peg. False for coordinates off the board.
    #[inline]
    pub fn is_occupied(&self, hole: Hole) -> bool {
        hole.index().is_some_and(|idx| self.bit(idx as u8))
    }

    #[inline]
    fn bit(&self, idx: u8) -> bool {
        (self.pegs >> idx) & 1 == 1
    }

    /// Every hole with its occupancy, in board key order.
    pub fn holes(&self) -> impl Iterator<Item = (Hole, bool)> + '_ {
        HOLES
            .iter()
            .enumerate()
            .map(move |(idx, &hole)| (hole, self.bit(idx as u8)))
    }

    /// Applied jumps, oldest first.
    pub fn history(&self) -> Vec<Jump> {
        self.history.iter().map(|j| j.unpack()).collect()
    }

    /// Applied jumps in packed form.
    #[inline]
    pub fn history_packed(&self) -> &[PackedJump] {
        &self.history
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_jump(&self) -> Option<Jump> {
        self.history.last().map(|j| j.unpack())
    }

    // ========== Legality ==========

    /// Whether a packed jump is legal: origin and midpoint occupied,
    /// endpoint empty.
    #[inline]
    pub fn is_legal_packed(&self, jump: PackedJump) -> bool {
        if !jump.is_valid() {
            return false;
        }
        let g = jump.geometry();
        self.bit(g.origin) && self.bit(g.midpoint) && !self.bit(g.endpoint)
    }

    /// Whether `origin` may jump along `vector`. Pairs missing from the
    /// topology table are simply not legal.
    pub fn is_legal(&self, origin: Hole, vector: Vector) -> bool {
        Jump::new(origin, vector)
            .pack()
            .is_some_and(|jump| self.is_legal_packed(jump))
    }

    /// All legal jumps as a packed list (no heap allocation).
    ///
    /// Order: origins in board key order, vectors in topology order.
    pub fn legal_jumps_packed(&self) -> JumpList {
        let mut jumps = JumpList::new();
        for idx in 0..MAX_JUMPS as u8 {
            let jump = PackedJump(idx);
            if self.is_legal_packed(jump) {
                jumps.push(jump);
            }
        }
        jumps
    }

    /// Legal jumps grouped by origin. Depends only on occupancy.
    pub fn legal_moves(&self) -> LegalMoves {
        let mut entries: Vec<(Hole, Vec<Vector>)> = Vec::new();
        for jump in self.legal_jumps_packed().iter().map(PackedJump::unpack) {
            match entries.last_mut() {
                Some((origin, vectors)) if *origin == jump.origin => vectors.push(jump.vector),
                _ => entries.push((jump.origin, vec![jump.vector])),
            }
        }
        LegalMoves { entries }
    }

    /// No legal jump remains.
    pub fn is_terminal(&self) -> bool {
        self.legal_jumps_packed().is_empty()
    }

    // ========== Apply & Undo ==========

    /// Apply a jump after checking it is legal.
    ///
    /// On failure the board is untouched.
    pub fn apply(&mut self, origin: Hole, vector: Vector) -> Result<(), PegError> {
        let applied = Jump::new(origin, vector)
            .pack()
            .is_some_and(|jump| self.apply_packed(jump));
        if !applied {
            return Err(PegError::IllegalMove { origin, vector });
        }
        tracing::trace!(%origin, %vector, pegs = self.peg_count, "applied jump");
        Ok(())
    }

    /// [`Board::apply`] taking a [`Jump`].
    pub fn apply_jump(&mut self, jump: Jump) -> Result<(), PegError> {
        self.apply(jump.origin, jump.vector)
    }

    /// Take back the last jump, returning it.
    pub fn undo(&mut self) -> Result<Jump, PegError> {
        let jump = self.undo_packed().ok_or(PegError::EmptyHistory)?;
        let jump = jump.unpack();
        tracing::trace!(origin = %jump.origin, vector = %jump.vector, pegs = self.peg_count, "undid jump");
        Ok(jump)
    }

    /// Reset to the starting configuration with an empty history.
    pub fn restart(&mut self) {
        self.pegs = self.start;
        self.peg_count = self.start.count_ones() as u8;
        self.history.clear();
    }

    /// Apply a packed jump if it is legal.
    ///
    /// Returns false and leaves the board untouched otherwise, including for
    /// indices outside the jump table.
    #[inline]
    #[must_use]
    pub fn apply_packed(&mut self, jump: PackedJump) -> bool {
        if !self.is_legal_packed(jump) {
            return false;
        }
        self.pegs ^= jump.mask();
        self.peg_count -= 1;
        self.history.push(jump);
        true
    }

    /// Undo the last packed jump. None if the history is empty.
    #[inline]
    pub fn undo_packed(&mut self) -> Option<PackedJump> {
        let jump = self.history.pop()?;
        self.pegs ^= jump.mask();
        self.peg_count += 1;
        Some(jump)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}
