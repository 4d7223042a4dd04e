// Copyright (c) 2018-2021 The MobileCoin Foundation

//! Look up the value stored under a key, without modifying the table.
//!
//! The output is `found` followed by the value chunks. `found` counts the
//! rows whose key matches, and each value chunk is the sum over rows of
//! `masked_select(selected, row chunk)`. With unique keys that is exactly the
//! stored value. With duplicates, the chunk sums combine every match.

use crate::table::TableShape;
use alloc::{vec, vec::Vec};
use masked_select::{equals_chunks, Evaluator, MaskedSelect};
use oblivious_kv_traits::Program;

/// The query program: `(table, key chunks) -> (found, value chunks)`
#[derive(Clone, Debug)]
pub struct QueryProgram<M: MaskedSelect> {
    shape: TableShape,
    mask: M,
}

impl<M: MaskedSelect> QueryProgram<M> {
    /// Make the program for tables of this shape
    pub fn new(shape: TableShape) -> Self {
        Self {
            shape,
            mask: M::for_chunk_bits(shape.chunk_bits()),
        }
    }
}

impl<M: MaskedSelect> Program for QueryProgram<M> {
    fn name(&self) -> &'static str {
        "query"
    }

    fn input_lens(&self) -> Vec<usize> {
        vec![self.shape.table_len(), self.shape.key_chunks()]
    }

    fn output_len(&self) -> usize {
        1 + self.shape.value_chunks()
    }

    fn evaluate<E: Evaluator>(&self, e: &E, args: &[&[E::Word]]) -> Vec<E::Word> {
        let (state, key) = (args[0], args[1]);

        let mut found = e.constant(0);
        let mut value: Vec<E::Word> = (0..self.shape.value_chunks())
            .map(|_| e.constant(0))
            .collect();
        for row in self.shape.rows(state) {
            let (_flag, row_key, row_value) = self.shape.split_row(row);

            let selected = equals_chunks(e, row_key, key);
            found = e.add(&found, &selected);
            for (acc, chunk) in value.iter_mut().zip(row_value) {
                let term = self.mask.masked_select(e, &selected, chunk);
                *acc = e.add(acc, &term);
            }
        }

        let mut result = Vec::with_capacity(self.output_len());
        result.push(found);
        result.extend(value);
        result
    }
}
