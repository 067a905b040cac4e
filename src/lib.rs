//! `ext-line-sort` is an external merge sort for line-oriented text files.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data.
//! External sorting is required when the data being sorted do not fit into the main memory (RAM)
//! of a computer and instead must be resided in slower external memory, usually a hard disk
//! drive. Sorting is achieved in two phases. During the first phase the input is split into
//! chunks that each fit in RAM, every chunk is sorted in memory and written to disk as a sorted
//! unit. During the second phase the units are merged pairwise following the optimal merge
//! pattern (always the two smallest units first) until a single sorted file remains. For more
//! information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `ext-line-sort` provides the following guarantees:
//!
//! * **Opaque lines:**
//!   lines are raw byte sequences compared byte-wise, terminator included;
//!   no parsing, no decoding, no ordering configuration.
//! * **Bounded memory:**
//!   at most the configured number of lines is held in memory while chunking
//!   (`memory-limit` feature: at most the configured number of bytes), and a merge
//!   holds a single pending line per side whatever the unit sizes are.
//! * **Minimal merge cost:**
//!   merging the two smallest units first minimizes the total number of lines
//!   re-read and re-written across the whole merge phase.
//! * **Scoped workspace:**
//!   intermediate units live in a private temporary directory that is removed on
//!   every exit path; the final unit is promoted to the output path with a single
//!   rename, never a copy.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ext_line_sort::{LimitedBufferBuilder, LineSorter, LineSorterBuilder};
//!
//! fn main() {
//!     let sorter: LineSorter = LineSorterBuilder::new()
//!         .with_tmp_dir(Path::new("./"))
//!         .with_buffer(LimitedBufferBuilder::new(1_000_000, true))
//!         .build();
//!
//!     sorter.sort(Path::new("input.txt"), Path::new("output.txt")).unwrap();
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod merger;
pub mod sort;
pub mod workspace;

pub use buffer::{ChunkBuffer, ChunkBufferBuilder, LimitedBuffer, LimitedBufferBuilder};
pub use chunk::{Line, LineReader, SortedUnit};
pub use merger::TwoWayMerger;
pub use sort::{LineSorter, LineSorterBuilder, MergeStats, SortError};
pub use workspace::Workspace;
