//! Limited chunk buffer implementations.

use crate::chunk::Line;

/// Buffer builder.
pub trait ChunkBufferBuilder: Default {
    type Buffer: ChunkBuffer;

    /// Creates a new buffer.
    fn build(&self) -> Self::Buffer;
}

/// Base limited buffer interface.
pub trait ChunkBuffer: IntoIterator<Item = Line> {
    /// Adds a new line to the buffer.
    fn push(&mut self, line: Line);

    /// Returns buffer length.
    fn len(&self) -> usize;

    /// Checks if the buffer reached the limit.
    fn is_full(&self) -> bool;

    /// Exposes the buffered lines for in-place sorting.
    fn as_mut_slice(&mut self) -> &mut [Line];
}

pub struct LimitedBufferBuilder {
    buffer_limit: usize,
    preallocate: bool,
}

impl LimitedBufferBuilder {
    pub fn new(buffer_limit: usize, preallocate: bool) -> Self {
        LimitedBufferBuilder {
            buffer_limit,
            preallocate,
        }
    }
}

impl ChunkBufferBuilder for LimitedBufferBuilder {
    type Buffer = LimitedBuffer;

    fn build(&self) -> Self::Buffer {
        if self.preallocate {
            LimitedBuffer::with_capacity(self.buffer_limit)
        } else {
            LimitedBuffer::new(self.buffer_limit)
        }
    }
}

impl Default for LimitedBufferBuilder {
    fn default() -> Self {
        LimitedBufferBuilder {
            buffer_limit: usize::MAX,
            preallocate: false,
        }
    }
}

/// Buffer limited by line count.
pub struct LimitedBuffer {
    limit: usize,
    inner: Vec<Line>,
}

impl LimitedBuffer {
    pub fn new(limit: usize) -> Self {
        LimitedBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        LimitedBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }
}

impl ChunkBuffer for LimitedBuffer {
    fn push(&mut self, line: Line) {
        self.inner.push(line);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    fn as_mut_slice(&mut self) -> &mut [Line] {
        self.inner.as_mut_slice()
    }
}

impl IntoIterator for LimitedBuffer {
    type Item = Line;
    type IntoIter = <Vec<Line> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}


#[cfg(feature = "memory-limit")]
pub mod mem {
    use super::{ChunkBuffer, ChunkBufferBuilder};
    use crate::chunk::Line;

    pub struct MemoryLimitedBufferBuilder {
        buffer_limit: u64,
    }

    impl MemoryLimitedBufferBuilder {
        pub fn new(buffer_limit: u64) -> Self {
            MemoryLimitedBufferBuilder { buffer_limit }
        }
    }

    impl ChunkBufferBuilder for MemoryLimitedBufferBuilder {
        type Buffer = MemoryLimitedBuffer;

        fn build(&self) -> Self::Buffer {
            MemoryLimitedBuffer::new(self.buffer_limit)
        }
    }

    impl Default for MemoryLimitedBufferBuilder {
        fn default() -> Self {
            MemoryLimitedBufferBuilder { buffer_limit: u64::MAX }
        }
    }

    /// Buffer limited by the summed byte length of the buffered lines.
    pub struct MemoryLimitedBuffer {
        limit: u64,
        current_size: u64,
        inner: Vec<Line>,
    }

    impl MemoryLimitedBuffer {
        pub fn new(limit: u64) -> Self {
            MemoryLimitedBuffer {
                limit,
                current_size: 0,
                inner: Vec::new(),
            }
        }

        pub fn mem_size(&self) -> u64 {
            self.current_size
        }
    }

    impl ChunkBuffer for MemoryLimitedBuffer {
        fn push(&mut self, line: Line) {
            self.current_size += line.len() as u64;
            self.inner.push(line);
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn is_full(&self) -> bool {
            self.current_size >= self.limit
        }

        fn as_mut_slice(&mut self) -> &mut [Line] {
            self.inner.as_mut_slice()
        }
    }

    impl IntoIterator for MemoryLimitedBuffer {
        type Item = Line;
        type IntoIter = <Vec<Line> as IntoIterator>::IntoIter;

        fn into_iter(self) -> Self::IntoIter {
            self.inner.into_iter()
        }
    }

}
