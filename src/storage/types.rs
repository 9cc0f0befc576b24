//! Row, cell and mutation types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Last timestamp handed out by [`Timestamp::now`], in microseconds.
static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(0);

/// Cell timestamp in microseconds since the Unix epoch.
///
/// The service only accepts millisecond granularity, so `now()` always
/// returns a multiple of 1000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Current time, strictly greater than any earlier `now()` in this process.
    pub fn now() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
            * 1000;

        let mut prev = LAST_TIMESTAMP_MICROS.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1000);
            match LAST_TIMESTAMP_MICROS.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Self(next),
                Err(x) => prev = x,
            }
        }
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.div_euclid(1_000_000);
        let micros = self.0.rem_euclid(1_000_000);
        write!(f, "{}.{:06}s", secs, micros)
    }
}

/// A single versioned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Fully qualified column, `family:qualifier`.
    pub column: String,
    pub timestamp: Timestamp,
    pub value: Vec<u8>,
}

impl Cell {
    /// The qualifier part of the column name.
    pub fn qualifier(&self) -> &str {
        self.column
            .split_once(':')
            .map(|(_, q)| q)
            .unwrap_or(&self.column)
    }

    /// Value rendered as UTF-8, lossily.
    pub fn value_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// A row read back from a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    /// Column family name to cells, cells ordered by column then newest first.
    pub families: BTreeMap<String, Vec<Cell>>,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            families: BTreeMap::new(),
        }
    }

    /// True when the row has no cells (also what an absent row reads back as).
    pub fn is_empty(&self) -> bool {
        self.families.values().all(|cells| cells.is_empty())
    }

    /// Iterate `(family, cell)` pairs in family order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.families
            .iter()
            .flat_map(|(family, cells)| cells.iter().map(move |c| (family.as_str(), c)))
    }

    pub fn cell_count(&self) -> usize {
        self.families.values().map(Vec::len).sum()
    }

    /// Approximate wire size, used for message-size limits.
    pub fn encoded_len(&self) -> usize {
        self.key.len()
            + self
                .cells()
                .map(|(family, c)| family.len() + c.column.len() + c.value.len() + 8)
                .sum::<usize>()
    }
}

/// A cell write carried by a [`Mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCell {
    pub family: String,
    pub qualifier: String,
    pub timestamp: Timestamp,
    pub value: Vec<u8>,
}

/// An ordered set of cell writes applied to one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutation {
    ops: Vec<SetCell>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write of `value` to `family:qualifier` at `timestamp`.
    pub fn set(
        mut self,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        timestamp: Timestamp,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.ops.push(SetCell {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            value: value.into(),
        });
        self
    }

    pub fn ops(&self) -> &[SetCell] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Approximate wire size, used for message-size limits.
    pub fn encoded_len(&self) -> usize {
        self.ops
            .iter()
            .map(|op| op.family.len() + op.qualifier.len() + op.value.len() + 8)
            .sum()
    }
}
