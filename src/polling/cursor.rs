//! Next-fetch offset held by the polling loop.

use crate::error::{PollError, Result};

/// Tracks the offset of the next unseen update.
///
/// Owned by a single polling loop and mutated only from it, so there is no
/// synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorTracker {
    offset: i64,
}

impl CursorTracker {
    pub fn new(offset: i64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Moves the cursor past `last_update_id`.
    ///
    /// `None` (empty batch) leaves the offset untouched. A successor lower than
    /// the current offset is rejected and the offset is kept.
    pub fn advance(&mut self, last_update_id: Option<i64>) -> Result<i64> {
        let Some(last_id) = last_update_id else {
            return Ok(self.offset);
        };

        let proposed = last_id
            .checked_add(1)
            .ok_or(PollError::CursorOverflow(last_id))?;

        if proposed < self.offset {
            return Err(PollError::CursorRegression {
                current: self.offset,
                proposed,
            });
        }

        self.offset = proposed;
        Ok(self.offset)
    }
}
