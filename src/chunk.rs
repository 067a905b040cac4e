//! Sorted units and line cursors.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::workspace::Workspace;

/// A single line including its terminating `\n` (when present).
/// The raw byte order of this value is the sort order.
pub type Line = Vec<u8>;

/// Pull-based cursor over a line-oriented reader.
/// Yields every line with its terminator; a final unterminated line is yielded verbatim.
pub struct LineReader<R> {
    reader: R,
}

impl<R: io::BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        LineReader { reader }
    }
}

impl<R: io::BufRead> Iterator for LineReader<R> {
    type Item = io::Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Line::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(err) => Some(Err(err)),
        }
    }
}

/// A durable, internally sorted run of lines with a known line count.
///
/// Units live in the sort workspace. Every unit is consumed exactly once:
/// either merged into a larger unit or promoted as the final result.
#[derive(Debug)]
pub struct SortedUnit {
    path: PathBuf,
    len: u64,
}

impl SortedUnit {
    /// Persists lines as a new unit file in the workspace.
    /// The caller guarantees the lines arrive in non-decreasing order.
    pub fn create<I>(workspace: &mut Workspace, lines: I, buf_size: Option<usize>) -> io::Result<Self>
    where
        I: IntoIterator<Item = Line>,
    {
        let path = workspace.allocate_unit_path();
        let file = fs::File::create(&path)?;

        let mut writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        let mut len = 0;
        for line in lines {
            writer.write_all(&line)?;
            len += 1;
        }
        writer.flush()?;

        return Ok(SortedUnit { path, len });
    }

    /// Restores a unit from a file already written to `path`.
    pub(crate) fn from_parts(path: PathBuf, len: u64) -> Self {
        SortedUnit { path, len }
    }

    /// Number of lines in the unit.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh cursor over the unit's lines.
    pub fn lines(&self, buf_size: Option<usize>) -> io::Result<LineReader<io::BufReader<fs::File>>> {
        let file = fs::File::open(&self.path)?;
        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };
        return Ok(LineReader::new(reader));
    }

    /// Consumes the unit, deleting its backing file.
    pub fn remove(self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }

    /// Consumes the unit, releasing its backing file to the caller.
    pub(crate) fn into_path(self) -> PathBuf {
        self.path
    }
}
