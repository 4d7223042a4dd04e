// Copyright (c) 2018-2021 The MobileCoin Foundation

//! Overwrite the value of every row whose key matches.
//!
//! For each row, `selected = equals_chunks(row key, key)`, and the new value
//! is `masked_select(selected, value) + masked_select(1 - selected, old)`.
//! Exactly one of the two terms is nonzero, so this is a branch-free select.
//! Flags and keys are copied through unchanged.
//!
//! The occupancy flag is not consulted. Free rows are all zeroes, so the
//! all-zeroes key matches every free row and replacing it writes into them.

use crate::table::TableShape;
use alloc::{vec, vec::Vec};
use masked_select::{complement, equals_chunks, Evaluator, MaskedSelect};
use oblivious_kv_traits::Program;

/// The replace program: `(table, key chunks, value chunks) -> table`
#[derive(Clone, Debug)]
pub struct ReplaceProgram<M: MaskedSelect> {
    shape: TableShape,
    mask: M,
}

impl<M: MaskedSelect> ReplaceProgram<M> {
    /// Make the program for tables of this shape
    pub fn new(shape: TableShape) -> Self {
        Self {
            shape,
            mask: M::for_chunk_bits(shape.chunk_bits()),
        }
    }
}

impl<M: MaskedSelect> Program for ReplaceProgram<M> {
    fn name(&self) -> &'static str {
        "replace"
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

        let mut result = Vec::with_capacity(self.shape.table_len());
        for row in self.shape.rows(state) {
            let (flag, row_key, row_value) = self.shape.split_row(row);

            let selected = equals_chunks(e, row_key, key);
            let kept = complement(e, &selected);

            result.push(flag.clone());
            result.extend(row_key.iter().cloned());
            for (old, new) in row_value.iter().zip(value) {
                let set = self.mask.masked_select(e, &selected, new);
                let keep = self.mask.masked_select(e, &kept, old);
                result.push(e.add(&set, &keep));
            }
        }
        result
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::table::{Table, TableConfig};
    use masked_select::{ArithmeticMask, LookupMask, Plaintext};
    use oblivious_kv_traits::testing::trace_program;

    fn shape() -> TableShape {
        TableConfig::new(3, 4, 8, 8).validate().unwrap()
    }

    fn replace<M: MaskedSelect>(cells: &[u64], key: &[u64], value: &[u64]) -> Vec<u64> {
        ReplaceProgram::<M>::new(shape()).evaluate(&Plaintext, &[cells, key, value])
    }

    const TABLE: [u64; 15] = [1, 1, 2, 3, 4, 1, 5, 6, 7, 8, 0, 0, 0, 0, 0];

    #[test]
    fn test_replace_hit() {
        let result = replace::<ArithmeticMask>(&TABLE, &[5, 6], &[15, 0]);
        assert_eq!(
            result,
            vec![1, 1, 2, 3, 4, 1, 5, 6, 15, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_replace_miss_is_noop() {
        assert_eq!(replace::<ArithmeticMask>(&TABLE, &[6, 5], &[15, 0]), TABLE.to_vec());
        assert_eq!(replace::<LookupMask>(&TABLE, &[1, 3], &[15, 0]), TABLE.to_vec());
        // empty table
        let empty = Table::new(shape());
        assert_eq!(
            replace::<ArithmeticMask>(empty.cells(), &[1, 2], &[3, 4]),
            empty.cells().to_vec()
        );
    }

    #[test]
    fn test_replace_is_idempotent() {
        let once = replace::<LookupMask>(&TABLE, &[1, 2], &[9, 9]);
        let twice = replace::<LookupMask>(&once, &[1, 2], &[9, 9]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_every_duplicate() {
        let cells = [1, 1, 2, 3, 4, 1, 1, 2, 7, 8, 0, 0, 0, 0, 0];
        let result = replace::<ArithmeticMask>(&cells, &[1, 2], &[0, 1]);
        assert_eq!(
            result,
            vec![1, 1, 2, 0, 1, 1, 1, 2, 0, 1, 0, 0, 0, 0, 0]
        );
    }

    // Free rows have zero keys, so the zero key selects them
    #[test]
    fn test_replace_zero_key_writes_free_rows() {
        let result = replace::<ArithmeticMask>(&TABLE, &[0, 0], &[2, 3]);
        assert_eq!(
            result,
            vec![1, 1, 2, 3, 4, 1, 5, 6, 7, 8, 0, 0, 0, 2, 3]
        );
    }

    #[test]
    fn test_masks_give_same_replace() {
        for key in &[[1u64, 2], [5, 6], [0, 0], [15, 15]] {
            assert_eq!(
                replace::<ArithmeticMask>(&TABLE, key, &[11, 13]),
                replace::<LookupMask>(&TABLE, key, &[11, 13])
            );
        }
    }

    #[test]
    fn test_replace_trace_is_data_independent() {
        let program = ReplaceProgram::<ArithmeticMask>::new(shape());
        let (_, trace_hit) = trace_program(&program, &[&TABLE, &[1, 2], &[3, 3]]);
        let (_, trace_miss) = trace_program(&program, &[&TABLE, &[2, 1], &[3, 3]]);
        // a mismatch in the first chunk vs the last chunk
        let (_, trace_late) = trace_program(&program, &[&TABLE, &[1, 3], &[0, 0]]);
        assert_eq!(trace_hit, trace_miss);
        assert_eq!(trace_hit, trace_late);
    }
}
