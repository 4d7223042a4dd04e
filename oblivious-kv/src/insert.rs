// Copyright (c) 2018-2021 The MobileCoin Foundation

//! Insert a key-value pair into the first free row.
//!
//! We scan every row once, carrying `already_found`, which is 0 until the
//! first free row has been selected and 1 after. A row is selected when
//! its flag and `already_found` are both 0:
//!
//! ```text
//! | already_found | flag | selected |
//! | 0             | 0    | 1        |
//! | 0             | 1    | 0        |
//! | 1             | 0    | 0        |
//! | 1             | 1    | 0        |
//! ```
//!
//! which is one lookup in `[1, 0, 0, 0]` at `2 * already_found + flag`.
//!
//! The new table is the old one plus a delta which is zero everywhere except
//! the selected row, where it is `1, key, value`. At most one row is
//! selected, and it was free (all zeroes), so the addition writes the pair
//! exactly. If there is no free row, the delta is all zeroes and the table
//! comes back unchanged.

use crate::table::TableShape;
use alloc::{vec, vec::Vec};
use masked_select::{Evaluator, LookupTable, MaskedSelect};
use oblivious_kv_traits::Program;

/// Selection table for the first free row, indexed by
/// `2 * already_found + flag`
const FIRST_FREE: [u64; 4] = [1, 0, 0, 0];

/// The insert program: `(table, key chunks, value chunks) -> table`
#[derive(Clone, Debug)]
pub struct InsertProgram<M: MaskedSelect> {
    shape: TableShape,
    mask: M,
    first_free: LookupTable,
}

impl<M: MaskedSelect> InsertProgram<M> {
    /// Make the program for tables of this shape
    pub fn new(shape: TableShape) -> Self {
        Self {
            shape,
            mask: M::for_chunk_bits(shape.chunk_bits()),
            first_free: LookupTable::new(FIRST_FREE.to_vec()),
        }
    }
}

impl<M: MaskedSelect> Program for InsertProgram<M> {
    fn name(&self) -> &'static str {
        "insert"
    }

    fn input_lens(&self) -> Vec<usize> {
        vec![
            self.shape.table_len(),
            self.shape.key_chunks(),
            self.shape.value_chunks(),
        ]
    }

    fn output_len(&self) -> usize {
        self.shape.table_len()
    }

    fn evaluate<E: Evaluator>(&self, e: &E, args: &[&[E::Word]]) -> Vec<E::Word> {
        let (state, key, value) = (args[0], args[1], args[2]);
        let two = e.constant(2);

        let mut already_found = e.constant(0);
        let mut result = Vec::with_capacity(self.shape.table_len());
        for row in self.shape.rows(state) {
            let (flag, row_key, row_value) = self.shape.split_row(row);

            let packed = e.add(&e.mul(&already_found, &two), flag);
            let selected = e.lookup(&self.first_free, &packed);
            // Only after computing this row's selection
            already_found = e.add(&already_found, &selected);

            result.push(e.add(flag, &selected));
            for (old, new) in row_key.iter().zip(key).chain(row_value.iter().zip(value)) {
                let delta = self.mask.masked_select(e, &selected, new);
                result.push(e.add(old, &delta));
            }
        }
        result
    }
}
