//! External line sorter.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::iter;
use std::path::Path;

use log;

use crate::buffer::{ChunkBuffer, ChunkBufferBuilder, LimitedBufferBuilder};
use crate::chunk::{Line, LineReader, SortedUnit};
use crate::merger::TwoWayMerger;
use crate::workspace::Workspace;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Input file opening error. Raised before any workspace is created.
    Input(io::Error),
    /// Temporary workspace creation error.
    Workspace(io::Error),
    /// The merge scheduler was invoked without any sorted units.
    NoUnits,
    /// Common I/O error while reading the input or reading/writing a sorted unit.
    Io(io::Error),
    /// Final rename of the sorted result to the output path failed.
    Promotion(io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Input(err) => Some(err),
            SortError::Workspace(err) => Some(err),
            SortError::NoUnits => None,
            SortError::Io(err) => Some(err),
            SortError::Promotion(err) => Some(err),
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Input(err) => write!(f, "input file not opened: {}", err),
            SortError::Workspace(err) => write!(f, "temporary workspace not created: {}", err),
            SortError::NoUnits => write!(f, "no sorted units to merge"),
            SortError::Io(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Promotion(err) => write!(f, "sorted result not promoted: {}", err),
        }
    }
}

/// Totals reported by the merge scheduler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Number of pairwise merges performed.
    pub merges: usize,
    /// Total lines read and rewritten across all merges.
    pub lines_moved: u64,
}

/// Line sorter builder. Provides methods for [`LineSorter`] initialization.
#[derive(Clone)]
pub struct LineSorterBuilder<B = LimitedBufferBuilder>
where
    B: ChunkBufferBuilder,
{
    /// Directory the temporary workspace is created under.
    tmp_dir: Option<Box<Path>>,
    /// Unit file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Chunk buffer builder.
    buffer_builder: B,
}

impl<B> LineSorterBuilder<B>
where
    B: ChunkBufferBuilder,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        LineSorterBuilder::default()
    }

    /// Builds a [`LineSorter`] instance using provided configuration.
    pub fn build(self) -> LineSorter<B> {
        LineSorter::new(self.tmp_dir.as_deref(), self.buffer_builder, self.rw_buf_size)
    }

    /// Sets directory the temporary workspace is created under.
    pub fn with_tmp_dir(mut self, path: &Path) -> LineSorterBuilder<B> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets buffer builder.
    pub fn with_buffer(mut self, buffer_builder: B) -> LineSorterBuilder<B> {
        self.buffer_builder = buffer_builder;
        return self;
    }

    /// Sets unit file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> LineSorterBuilder<B> {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl<B> Default for LineSorterBuilder<B>
where
    B: ChunkBufferBuilder,
{
    fn default() -> Self {
        LineSorterBuilder {
            tmp_dir: None,
            rw_buf_size: None,
            buffer_builder: B::default(),
        }
    }
}

/// External line sorter.
///
/// Splits the input into chunks of at most the configured number of lines,
/// sorts every chunk in memory and persists it as a sorted unit, then merges
/// the units pairwise, smallest pair first, until a single sorted unit
/// remains and promotes it to the output path.
pub struct LineSorter<B = LimitedBufferBuilder>
where
    B: ChunkBufferBuilder,
{
    /// Directory the temporary workspace is created under.
    tmp_dir: Option<Box<Path>>,
    /// Chunk buffer builder.
    buffer_builder: B,
    /// Unit file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl<B> LineSorter<B>
where
    B: ChunkBufferBuilder,
{
    /// Creates a new line sorter instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory the temporary workspace is created under. If the parameter
    ///   is [`None`] the default OS temporary directory will be used.
    /// * `buffer_builder` - An instance of a buffer builder that will be used for chunk
    ///   buffer creation. The buffer limit is the chunk capacity.
    /// * `rw_buf_size` - Unit file read/write buffer size.
    pub fn new(tmp_path: Option<&Path>, buffer_builder: B, rw_buf_size: Option<usize>) -> Self {
        LineSorter {
            tmp_dir: tmp_path.map(|path| path.into()),
            buffer_builder,
            rw_buf_size,
        }
    }

    /// Sorts the lines of the `input` file into the `output` file.
    ///
    /// The output file is replaced if it already exists. On any failure no
    /// partial output is left at `output` and the temporary workspace is
    /// removed along with all intermediate units.
    ///
    /// # Arguments
    /// * `input` - Path of the line-oriented file to be sorted
    /// * `output` - Path the sorted result is promoted to
    pub fn sort(&self, input: &Path, output: &Path) -> Result<(), SortError> {
        let input_file = fs::File::open(input).map_err(SortError::Input)?;
        let input_reader = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, input_file),
            None => io::BufReader::new(input_file),
        };

        let mut workspace = Workspace::create(self.tmp_dir.as_deref()).map_err(SortError::Workspace)?;

        let units = self.produce_units(LineReader::new(input_reader), &mut workspace)?;
        log::debug!("chunking done ({} sorted units)", units.len());

        let (merged, stats) = if units.is_empty() {
            // empty input: promote an empty unit instead of invoking the scheduler
            let unit = SortedUnit::create(&mut workspace, iter::empty(), self.rw_buf_size)
                .map_err(SortError::Io)?;
            (unit, MergeStats::default())
        } else {
            self.merge_units(&mut workspace, units)?
        };

        log::info!(
            "sorted {} lines in {} merges ({} lines moved)",
            merged.len(),
            stats.merges,
            stats.lines_moved
        );

        return workspace.promote(merged, output).map_err(SortError::Promotion);
    }

    /// Splits the input cursor into consecutive chunks of at most the buffer
    /// limit, sorts each chunk in memory and persists it as a leaf unit.
    /// Empty input produces no units.
    fn produce_units<I>(&self, input: I, workspace: &mut Workspace) -> Result<Vec<SortedUnit>, SortError>
    where
        I: IntoIterator<Item = io::Result<Line>>,
    {
        let mut chunk_buf = self.buffer_builder.build();
        let mut units = Vec::new();

        for line in input {
            chunk_buf.push(line.map_err(SortError::Io)?);

            if chunk_buf.is_full() {
                units.push(self.create_unit(workspace, chunk_buf)?);
                chunk_buf = self.buffer_builder.build();
            }
        }

        if chunk_buf.len() > 0 {
            units.push(self.create_unit(workspace, chunk_buf)?);
        }

        return Ok(units);
    }

    fn create_unit(&self, workspace: &mut Workspace, mut buffer: B::Buffer) -> Result<SortedUnit, SortError> {
        log::debug!("sorting chunk ({} lines)", buffer.len());
        buffer.as_mut_slice().sort_unstable();

        log::debug!("saving chunk");
        SortedUnit::create(workspace, buffer, self.rw_buf_size).map_err(SortError::Io)
    }

    /// Merges sorted units into a single unit using the optimal merge pattern:
    /// the two smallest units are always merged first, which minimizes the
    /// total number of lines read and rewritten across all merges (the same
    /// greedy choice that builds a Huffman tree).
    ///
    /// A single unit is returned as is, without being rewritten. Zero units is
    /// a usage error.
    fn merge_units(
        &self,
        workspace: &mut Workspace,
        units: Vec<SortedUnit>,
    ) -> Result<(SortedUnit, MergeStats), SortError> {
        if units.is_empty() {
            return Err(SortError::NoUnits);
        }

        let mut queue = BinaryHeap::with_capacity(units.len());
        let mut next_seq = 0u64;
        for unit in units {
            queue.push(QueueEntry {
                len: unit.len(),
                seq: next_seq,
                unit,
            });
            next_seq += 1;
        }

        let mut stats = MergeStats::default();
        while queue.len() >= 2 {
            let (first, second) = match (queue.pop(), queue.pop()) {
                (Some(first), Some(second)) => (first, second),
                _ => break,
            };

            let merged = self.merge_pair(workspace, first.unit, second.unit)?;
            stats.merges += 1;
            stats.lines_moved += merged.len();

            queue.push(QueueEntry {
                len: merged.len(),
                seq: next_seq,
                unit: merged,
            });
            next_seq += 1;
        }

        return match queue.pop() {
            Some(entry) => Ok((entry.unit, stats)),
            None => Err(SortError::NoUnits),
        };
    }

    /// Merges two units into a freshly allocated one and deletes both inputs.
    fn merge_pair(
        &self,
        workspace: &mut Workspace,
        first: SortedUnit,
        second: SortedUnit,
    ) -> Result<SortedUnit, SortError> {
        log::debug!("merging units ({} + {} lines)", first.len(), second.len());

        let path = workspace.allocate_unit_path();
        let file = fs::File::create(&path).map_err(SortError::Io)?;
        let mut writer = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        let merger = TwoWayMerger::new(
            first.lines(self.rw_buf_size).map_err(SortError::Io)?,
            second.lines(self.rw_buf_size).map_err(SortError::Io)?,
        );

        let mut len = 0;
        for line in merger {
            let line = line.map_err(SortError::Io)?;
            writer.write_all(&line).map_err(SortError::Io)?;
            len += 1;
        }
        writer.flush().map_err(SortError::Io)?;

        debug_assert_eq!(len, first.len() + second.len());

        first.remove().map_err(SortError::Io)?;
        second.remove().map_err(SortError::Io)?;

        return Ok(SortedUnit::from_parts(path, len));
    }
}

/// Scheduler queue entry. [`BinaryHeap`] is a max-heap, so the ordering is
/// reversed to pop the smallest unit first; equal sizes fall back to the
/// insertion sequence number, keeping pairings deterministic across runs.
struct QueueEntry {
    len: u64,
    seq: u64,
    unit: SortedUnit,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.len, self.seq) == (other.len, other.seq)
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.len, self.seq).cmp(&(other.len, other.seq)).reverse()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::fs;

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{LineSorter, LineSorterBuilder, SortError};
    use crate::buffer::LimitedBufferBuilder;
    use crate::chunk::SortedUnit;
    use crate::workspace::Workspace;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn sorter(max_lines: usize) -> LineSorter {
        LineSorterBuilder::new()
            .with_buffer(LimitedBufferBuilder::new(max_lines, true))
            .build()
    }

    fn leaf_unit(workspace: &mut Workspace, lines: &[&str]) -> SortedUnit {
        SortedUnit::create(workspace, lines.iter().map(|line| line.as_bytes().to_vec()), None).unwrap()
    }

    fn line_counts(data: &str) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for line in data.split_inclusive('\n') {
            *counts.entry(line).or_insert(0) += 1;
        }
        return counts;
    }

    #[rstest]
    fn test_sorts_shuffled_input(tmp_dir: tempfile::TempDir) {
        let mut lines = Vec::from_iter((0..100).map(|n| format!("{:03}\n", n)));
        lines.shuffle(&mut rand::thread_rng());

        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, lines.concat()).unwrap();

        sorter(8).sort(&input, &output).unwrap();

        let expected: String = (0..100).map(|n| format!("{:03}\n", n)).collect();
        assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    }

    #[rstest]
    fn test_multiset_is_conserved(tmp_dir: tempfile::TempDir) {
        let mut lines = Vec::from_iter((0..30).map(|n| format!("{}\n", n % 7)));
        lines.shuffle(&mut rand::thread_rng());
        let input_data = lines.concat();

        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, &input_data).unwrap();

        sorter(4).sort(&input, &output).unwrap();

        let output_data = fs::read_to_string(&output).unwrap();
        assert_eq!(line_counts(&output_data), line_counts(&input_data));
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(64)]
    fn test_chunk_capacity_invariance(#[case] max_lines: usize, tmp_dir: tempfile::TempDir) {
        let mut lines = Vec::from_iter((0..64).map(|n| format!("{:02}\n", n)));
        lines.shuffle(&mut rand::thread_rng());

        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, lines.concat()).unwrap();

        sorter(max_lines).sort(&input, &output).unwrap();

        let expected: String = (0..64).map(|n| format!("{:02}\n", n)).collect();
        assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    }

    #[rstest]
    fn test_concrete_scenario(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, "d\nb\na\nc\n").unwrap();

        sorter(2).sort(&input, &output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "a\nb\nc\nd\n");
    }

    #[rstest]
    fn test_empty_input_produces_empty_output(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, "").unwrap();

        sorter(2).sort(&input, &output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }

    #[rstest]
    fn test_sorted_input_is_reproduced(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, "a\nb\nc\nd\ne\n").unwrap();

        sorter(3).sort(&input, &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), fs::read(&input).unwrap());
    }

    #[rstest]
    fn test_existing_output_is_replaced(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, "b\na\n").unwrap();
        fs::write(&output, "stale\n").unwrap();

        sorter(2).sort(&input, &output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "a\nb\n");
    }

    #[rstest]
    fn test_missing_input(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("missing.txt");
        let output = tmp_dir.path().join("output.txt");

        let result = sorter(2).sort(&input, &output);

        assert!(matches!(result, Err(SortError::Input(_))));
        assert!(!output.exists());
    }

    #[rstest]
    fn test_workspace_is_removed_on_success(tmp_dir: tempfile::TempDir) {
        let workspace_parent = tmp_dir.path().join("workspaces");
        fs::create_dir(&workspace_parent).unwrap();

        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, "c\nb\na\n").unwrap();

        let sorter: LineSorter = LineSorterBuilder::new()
            .with_buffer(LimitedBufferBuilder::new(1, true))
            .with_tmp_dir(&workspace_parent)
            .build();
        sorter.sort(&input, &output).unwrap();

        assert_eq!(fs::read_dir(&workspace_parent).unwrap().count(), 0);
    }

    #[rstest]
    fn test_workspace_is_removed_on_promotion_failure(tmp_dir: tempfile::TempDir) {
        let workspace_parent = tmp_dir.path().join("workspaces");
        fs::create_dir(&workspace_parent).unwrap();

        let input = tmp_dir.path().join("input.txt");
        // renaming into a directory that does not exist fails
        let output = tmp_dir.path().join("missing-dir").join("output.txt");
        fs::write(&input, "b\na\n").unwrap();

        let sorter: LineSorter = LineSorterBuilder::new()
            .with_buffer(LimitedBufferBuilder::new(1, true))
            .with_tmp_dir(&workspace_parent)
            .build();
        let result = sorter.sort(&input, &output);

        assert!(matches!(result, Err(SortError::Promotion(_))));
        assert!(!output.exists());
        assert_eq!(fs::read_dir(&workspace_parent).unwrap().count(), 0);
    }

    #[rstest]
    fn test_scheduler_rejects_zero_units() {
        let mut workspace = Workspace::create(None).unwrap();

        let result = sorter(2).merge_units(&mut workspace, Vec::new());

        assert!(matches!(result, Err(SortError::NoUnits)));
    }

    #[rstest]
    fn test_scheduler_single_unit_is_not_rewritten() {
        let mut workspace = Workspace::create(None).unwrap();
        let unit = leaf_unit(&mut workspace, &["a\n", "b\n"]);
        let unit_path = unit.path().to_path_buf();

        let (result, stats) = sorter(2).merge_units(&mut workspace, vec![unit]).unwrap();

        assert_eq!(result.path(), unit_path);
        assert_eq!(stats.merges, 0);
        assert_eq!(stats.lines_moved, 0);
    }

    #[rstest]
    fn test_scheduler_performs_n_minus_1_merges() {
        let mut workspace = Workspace::create(None).unwrap();
        let mut units = Vec::new();
        for line in ["e\n", "b\n", "d\n", "a\n", "c\n"] {
            units.push(leaf_unit(&mut workspace, &[line]));
        }

        let (result, stats) = sorter(2).merge_units(&mut workspace, units).unwrap();

        assert_eq!(stats.merges, 4);
        assert_eq!(result.len(), 5);

        let merged: std::io::Result<Vec<_>> = result.lines(None).unwrap().collect();
        let merged = merged.unwrap();
        assert_eq!(
            merged,
            vec![
                b"a\n".to_vec(),
                b"b\n".to_vec(),
                b"c\n".to_vec(),
                b"d\n".to_vec(),
                b"e\n".to_vec()
            ]
        );
    }

    #[cfg(feature = "memory-limit")]
    #[rstest]
    fn test_sorts_with_memory_limited_buffer(tmp_dir: tempfile::TempDir) {
        use crate::buffer::mem::MemoryLimitedBufferBuilder;

        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, "d\nb\na\nc\n").unwrap();

        let sorter: LineSorter<MemoryLimitedBufferBuilder> = LineSorterBuilder::new()
            .with_buffer(MemoryLimitedBufferBuilder::new(4))
            .build();
        sorter.sort(&input, &output).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "a\nb\nc\nd\n");
    }

    #[rstest]
    fn test_scheduler_merges_smallest_pair_first() {
        let mut workspace = Workspace::create(None).unwrap();
        let units = vec![
            leaf_unit(&mut workspace, &["a\n", "b\n"]),
            leaf_unit(&mut workspace, &["c\n", "d\n", "e\n"]),
            leaf_unit(&mut workspace, &["f\n", "g\n", "h\n", "i\n", "j\n"]),
        ];

        let (result, stats) = sorter(2).merge_units(&mut workspace, units).unwrap();

        // 2+3 first (cost 5), then 5+5 (cost 10); the greedy total is 15,
        // while merging the largest unit early would cost 17.
        assert_eq!(stats.merges, 2);
        assert_eq!(stats.lines_moved, 15);
        assert_eq!(result.len(), 10);
    }
}
