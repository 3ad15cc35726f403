use std::mem;

use tokio::time::{Duration, Instant};

use crate::Row;

/// In-memory buffer of rows waiting for the writer.
///
/// A batch is due when it holds `max_rows` rows or when `max_age` has
/// passed since its first row arrived. The age deadline only exists
/// while the buffer is non-empty.
#[derive(Debug)]
pub struct BatchBuffer {
    rows: Vec<Row>,
    max_rows: usize,
    max_age: Duration,
    deadline: Option<Instant>,
}

impl BatchBuffer {
    pub fn new(max_rows: usize, max_age: Duration) -> Self {
        Self {
            rows: Vec::new(),
            max_rows,
            max_age,
            deadline: None,
        }
    }

    /// Appends one fetch result in order.
    ///
    /// Returns `true` when the size threshold has been reached and the
    /// batch should be flushed right away.
    pub fn push(&mut self, rows: Vec<Row>, now: Instant) -> bool {
        if rows.is_empty() {
            return false;
        }
        if self.rows.is_empty() {
            self.deadline = Some(now + self.max_age);
        }
        self.rows.extend(rows);
        self.rows.len() >= self.max_rows
    }

    /// Takes every buffered row and clears the age deadline.
    ///
    /// Returns `None` for an empty buffer so no zero-length write is issued.
    pub fn take(&mut self) -> Option<Vec<Row>> {
        self.deadline = None;
        if self.rows.is_empty() {
            return None;
        }
        Some(mem::take(&mut self.rows))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
