// Copyright (c) 2018-2021 The MobileCoin Foundation

//! The state table: a fixed number of rows, each an occupancy flag followed by
//! the key chunks and then the value chunks, stored flat and row-major.
//!
//! ```text
//! | flag | key chunk 0 .. key chunk k-1 | value chunk 0 .. value chunk v-1 |
//! ```
//!
//! The table algorithms only ever see this flat array, so the layout helpers
//! here are generic over the word type.

use alloc::{vec, vec::Vec};
use chunk_codec::{ChunkCodec, CodecError};
use core::slice::ChunksExact;

/// User-facing configuration of a table. Validate it to get a `TableShape`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableConfig {
    /// Number of rows
    pub capacity: usize,
    /// Width of each chunk in bits
    pub chunk_bits: u32,
    /// Width of keys in bits, a multiple of `chunk_bits`
    pub key_bits: u32,
    /// Width of values in bits, a multiple of `chunk_bits`
    pub value_bits: u32,
}

impl Default for TableConfig {
    /// 5 rows of 32-bit keys and values, in 4-bit chunks
    fn default() -> Self {
        Self::new(5, 4, 32, 32)
    }
}

impl TableConfig {
    /// Make a config. Nothing is checked until `validate`.
    pub const fn new(capacity: usize, chunk_bits: u32, key_bits: u32, value_bits: u32) -> Self {
        Self {
            capacity,
            chunk_bits,
            key_bits,
            value_bits,
        }
    }

    /// A config where keys and values are a single chunk of `bits` bits
    pub const fn single_chunk(capacity: usize, bits: u32) -> Self {
        Self::new(capacity, bits, bits, bits)
    }

    /// Check the widths, failing with `InvalidWidth` if the chunk width is
    /// unsupported or the key or value width is not a multiple of it.
    pub fn validate(&self) -> Result<TableShape, CodecError> {
        let codec = ChunkCodec::new(self.chunk_bits)?;
        Ok(TableShape {
            capacity: self.capacity,
            chunk_bits: self.chunk_bits,
            key_bits: self.key_bits,
            value_bits: self.value_bits,
            key_chunks: codec.chunk_count(self.key_bits)?,
            value_chunks: codec.chunk_count(self.value_bits)?,
        })
    }
}

/// A validated table configuration, with the derived layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableShape {
    capacity: usize,
    chunk_bits: u32,
    key_bits: u32,
    value_bits: u32,
    key_chunks: usize,
    value_chunks: usize,
}

impl TableShape {
    /// Number of rows
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Width of each chunk in bits
    #[inline]
    pub fn chunk_bits(&self) -> u32 {
        self.chunk_bits
    }
    /// Width of keys in bits
    #[inline]
    pub fn key_bits(&self) -> u32 {
        self.key_bits
    }
    /// Width of values in bits
    #[inline]
    pub fn value_bits(&self) -> u32 {
        self.value_bits
    }
    /// Chunks per key
    #[inline]
    pub fn key_chunks(&self) -> usize {
        self.key_chunks
    }
    /// Chunks per value
    #[inline]
    pub fn value_chunks(&self) -> usize {
        self.value_chunks
    }
    /// Words per row: the flag, then the key and value chunks
    #[inline]
    pub fn row_width(&self) -> usize {
        1 + self.key_chunks + self.value_chunks
    }
    /// Words in the whole table
    #[inline]
    pub fn table_len(&self) -> usize {
        self.capacity * self.row_width()
    }
    /// One more than the largest chunk value
    #[inline]
    pub fn radix(&self) -> u64 {
        1u64 << self.chunk_bits
    }

    /// Iterate over the rows of a flat table
    pub fn rows<'a, W>(&self, cells: &'a [W]) -> ChunksExact<'a, W> {
        debug_assert!(cells.len() == self.table_len(), "table has wrong length");
        cells.chunks_exact(self.row_width())
    }

    /// Split a row into its flag, key chunks and value chunks
    pub fn split_row<'a, W>(&self, row: &'a [W]) -> (&'a W, &'a [W], &'a [W]) {
        debug_assert!(row.len() == self.row_width(), "row has wrong length");
        let (flag, rest) = row.split_at(1);
        let (key, value) = rest.split_at(self.key_chunks);
        (&flag[0], key, value)
    }
}

/// One row of a plaintext table
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    flag: &'a u64,
    key: &'a [u64],
    value: &'a [u64],
}

impl<'a> Row<'a> {
    /// 1 if the row holds a pair, 0 if free
    pub fn flag(&self) -> u64 {
        *self.flag
    }
    /// The key chunks
    pub fn key(&self) -> &'a [u64] {
        self.key
    }
    /// The value chunks
    pub fn value(&self) -> &'a [u64] {
        self.value
    }
}

/// The contents of a store: exactly `capacity` rows, as plaintext words.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Table {
    shape: TableShape,
    cells: Vec<u64>,
}

impl Table {
    /// A table with every row free and zeroed
    pub fn new(shape: TableShape) -> Self {
        Self {
            shape,
            cells: vec![0; shape.table_len()],
        }
    }

    /// Wrap the flat output of a table program.
    /// Returns the cells back if they are not the right length for the shape.
    pub fn from_cells(shape: TableShape, cells: Vec<u64>) -> Result<Self, Vec<u64>> {
        if cells.len() != shape.table_len() {
            return Err(cells);
        }
        Ok(Self { shape, cells })
    }

    /// The shape of the table
    pub fn shape(&self) -> &TableShape {
        &self.shape
    }

    /// The flat, row-major contents
    pub fn cells(&self) -> &[u64] {
        &self.cells
    }

    /// Iterate over the rows
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        let shape = self.shape;
        shape.rows(&self.cells).map(move |row| {
            let (flag, key, value) = shape.split_row(row);
            Row { flag, key, value }
        })
    }

    /// Systematically check the table invariants, panicking if one does not
    /// hold, and return the number of occupied rows.
    ///
    /// - every flag is 0 or 1
    /// - every chunk is below the radix
    /// - every free row is all zeroes
    ///
    /// This branches on the contents and is only meant for tests.
    pub fn check_invariants(&self) -> usize {
        let radix = self.shape.radix();
        let mut occupied = 0;
        for (idx, row) in self.rows().enumerate() {
            assert!(row.flag() <= 1, "row {} has flag {}", idx, row.flag());
            assert!(
                row.key().iter().chain(row.value()).all(|chunk| *chunk < radix),
                "row {} has a chunk out of range",
                idx
            );
            if row.flag() == 0 {
                assert!(
                    row.key().iter().chain(row.value()).all(|chunk| *chunk == 0),
                    "free row {} is not zeroed",
                    idx
                );
            } else {
                occupied += 1;
            }
        }
        occupied
    }
}
