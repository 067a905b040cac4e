//! Two-way streaming merger.

use std::io;

use crate::chunk::Line;

/// Merges two sorted line cursors into a single sorted stream.
///
/// One pending line is held per side, so memory stays constant regardless of
/// input size. Equal lines are taken from the left cursor first. Once one side
/// is exhausted the other is drained without further comparison. A read error
/// is yielded in place and terminates the stream; no line is emitted for a
/// read that failed.
pub struct TwoWayMerger<L, R>
where
    L: Iterator<Item = io::Result<Line>>,
    R: Iterator<Item = io::Result<Line>>,
{
    left: L,
    right: R,
    pending_left: Option<Line>,
    pending_right: Option<Line>,
    failed: bool,
}

impl<L, R> TwoWayMerger<L, R>
where
    L: Iterator<Item = io::Result<Line>>,
    R: Iterator<Item = io::Result<Line>>,
{
    /// Creates a merger over two cursors.
    /// Each cursor must yield lines in ascending order, otherwise the result is undefined.
    pub fn new(left: L, right: R) -> Self {
        TwoWayMerger {
            left,
            right,
            pending_left: None,
            pending_right: None,
            failed: false,
        }
    }
}

impl<L, R> Iterator for TwoWayMerger<L, R>
where
    L: Iterator<Item = io::Result<Line>>,
    R: Iterator<Item = io::Result<Line>>,
{
    type Item = io::Result<Line>;

    /// Returns the next line of the merged stream in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if self.pending_left.is_none() {
            match self.left.next() {
                Some(Ok(line)) => self.pending_left = Some(line),
                Some(Err(err)) => {
                    self.failed = true;
                    return Some(Err(err));
                }
                None => {}
            }
        }

        if self.pending_right.is_none() {
            match self.right.next() {
                Some(Ok(line)) => self.pending_right = Some(line),
                Some(Err(err)) => {
                    self.failed = true;
                    return Some(Err(err));
                }
                None => {}
            }
        }

        let take_left = match (&self.pending_left, &self.pending_right) {
            (Some(left), Some(right)) => left <= right,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        let line = if take_left {
            self.pending_left.take()
        } else {
            self.pending_right.take()
        };

        return line.map(Ok);
    }
}
