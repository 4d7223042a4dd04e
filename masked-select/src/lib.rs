// Copyright (c) 2018-2021 The MobileCoin Foundation

//! Branch-free building blocks for oblivious table algorithms.
//!
//! Algorithms in this workspace are written against the `Evaluator` trait,
//! which only offers arithmetic, equality indicators and table lookups. There
//! is no way to branch on a `Word`, so the same algorithm can be run directly
//! on plaintext `u64`s with `Plaintext`, or handed unmodified to an engine
//! that evaluates it over values it cannot see.
//!
//! On top of that we build the two primitives every table operation uses:
//! - `equals_chunks`, a 0/1 indicator that two chunk sequences are equal,
//!   computed without early exit.
//! - `MaskedSelect`, "value if selector is 1, else 0", with an arithmetic
//!   implementation and a single-lookup-table implementation which are
//!   observably equivalent.

#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]

extern crate alloc;

use alloc::vec::Vec;
pub use subtle;
use subtle::{ConditionallySelectable, ConstantTimeEq};

/// The arithmetic domain a program is evaluated in.
///
/// Every operation takes its operands by reference and produces a fresh
/// `Word`. Implementations must not let the cost or the memory access pattern
/// of an operation depend on the values of its operands.
pub trait Evaluator {
    /// The value type operated on, e.g. `u64` for plaintext, or a ciphertext
    type Word: Clone;

    /// Lift a public constant into the domain
    fn constant(&self, value: u64) -> Self::Word;

    /// lhs + rhs
    fn add(&self, lhs: &Self::Word, rhs: &Self::Word) -> Self::Word;

    /// lhs - rhs
    fn sub(&self, lhs: &Self::Word, rhs: &Self::Word) -> Self::Word;

    /// lhs * rhs
    fn mul(&self, lhs: &Self::Word, rhs: &Self::Word) -> Self::Word;

    /// 1 if lhs == rhs, else 0
    fn eq(&self, lhs: &Self::Word, rhs: &Self::Word) -> Self::Word;

    /// Evaluate a lookup table at `index`.
    /// An index past the end of the table evaluates to 0.
    fn lookup(&self, table: &LookupTable, index: &Self::Word) -> Self::Word;

    /// Sum a sequence of words, starting from zero
    fn sum<'a, I>(&self, words: I) -> Self::Word
    where
        I: IntoIterator<Item = &'a Self::Word>,
        Self::Word: 'a,
    {
        words
            .into_iter()
            .fold(self.constant(0), |acc, word| self.add(&acc, word))
    }
}

/// An immutable table of words, evaluated by `Evaluator::lookup`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LookupTable {
    entries: Vec<u64>,
}

impl LookupTable {
    /// Make a table from its entries
    pub fn new(entries: Vec<u64>) -> Self {
        Self { entries }
    }

    /// The number of entries in the table
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries of the table
    #[inline]
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }
}

/// Evaluates programs directly over `u64`.
///
/// Arithmetic wraps, so every program is total over its inputs. Equality and
/// lookups are constant-time, which makes this suitable as a reference for
/// the oblivious engines as well as for testing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plaintext;

impl Evaluator for Plaintext {
    type Word = u64;

    #[inline]
    fn constant(&self, value: u64) -> u64 {
        value
    }

    #[inline]
    fn add(&self, lhs: &u64, rhs: &u64) -> u64 {
        lhs.wrapping_add(*rhs)
    }

    #[inline]
    fn sub(&self, lhs: &u64, rhs: &u64) -> u64 {
        lhs.wrapping_sub(*rhs)
    }

    #[inline]
    fn mul(&self, lhs: &u64, rhs: &u64) -> u64 {
        lhs.wrapping_mul(*rhs)
    }

    #[inline]
    fn eq(&self, lhs: &u64, rhs: &u64) -> u64 {
        u64::from(lhs.ct_eq(rhs).unwrap_u8())
    }

    /// Scans the whole table, conditionally assigning the matching entry, so
    /// that the memory access pattern does not reveal the index.
    ///
    /// No entry matches an out-of-range index, so the result is then 0.
    fn lookup(&self, table: &LookupTable, index: &u64) -> u64 {
        let mut result = 0u64;
        for (idx, entry) in table.entries().iter().enumerate() {
            result.conditional_assign(entry, (idx as u64).ct_eq(index));
        }
        result
    }
}

/// 1 - bit, for a 0/1 indicator
#[inline]
pub fn complement<E: Evaluator>(e: &E, bit: &E::Word) -> E::Word {
    e.sub(&e.constant(1), bit)
}

/// 1 if every chunk of `a` equals the corresponding chunk of `b`, else 0.
///
/// This sums the per-chunk equality indicators and compares the sum to the
/// chunk count, so the work done is the same wherever a mismatch occurs.
pub fn equals_chunks<E: Evaluator>(e: &E, a: &[E::Word], b: &[E::Word]) -> E::Word {
    debug_assert!(a.len() == b.len(), "chunk sequences differ in length");
    let indicators: Vec<E::Word> = a.iter().zip(b).map(|(x, y)| e.eq(x, y)).collect();
    let matches = e.sum(&indicators);
    e.eq(&matches, &e.constant(a.len() as u64))
}

/// "Masked select": `value` if `selector` is 1, else 0, with no branch.
///
/// `selector` must be 0 or 1 and `value` must be a chunk, i.e. below
/// `2^chunk_bits`. Implementations differ only in which evaluator operations
/// they use, and must agree on every valid pair of inputs.
pub trait MaskedSelect: Clone {
    /// Build the mask for chunks of `chunk_bits` bits
    fn for_chunk_bits(chunk_bits: u32) -> Self;

    /// Compute the masked value
    fn masked_select<E: Evaluator>(&self, e: &E, selector: &E::Word, value: &E::Word) -> E::Word;

    /// Apply `masked_select` with one selector to each chunk of a sequence
    fn masked_select_all<E: Evaluator>(
        &self,
        e: &E,
        selector: &E::Word,
        values: &[E::Word],
    ) -> Vec<E::Word> {
        values
            .iter()
            .map(|value| self.masked_select(e, selector, value))
            .collect()
    }
}

/// Masked select as `selector * value`
#[derive(Clone, Copy, Debug, Default)]
pub struct ArithmeticMask;

impl MaskedSelect for ArithmeticMask {
    fn for_chunk_bits(_chunk_bits: u32) -> Self {
        ArithmeticMask
    }

    #[inline]
    fn masked_select<E: Evaluator>(&self, e: &E, selector: &E::Word, value: &E::Word) -> E::Word {
        e.mul(selector, value)
    }
}

/// Masked select as a single lookup table.
///
/// The selector is packed above the value, `selector * 2^chunk_bits + value`,
/// and used to index a table whose lower half is all zeroes and whose upper
/// half is the identity. This is for engines where table lookups are the
/// cheap (or only) way to express a conditional.
#[derive(Clone, Debug)]
pub struct LookupMask {
    radix: u64,
    table: LookupTable,
}

impl LookupMask {
    /// The table used for selection
    pub fn table(&self) -> &LookupTable {
        &self.table
    }
}

impl MaskedSelect for LookupMask {
    fn for_chunk_bits(chunk_bits: u32) -> Self {
        debug_assert!(chunk_bits > 0 && chunk_bits < 32, "unreasonable chunk size");
        let radix = 1u64 << chunk_bits;
        let entries = (0..radix).map(|_| 0).chain(0..radix).collect();
        Self {
            radix,
            table: LookupTable::new(entries),
        }
    }

    #[inline]
    fn masked_select<E: Evaluator>(&self, e: &E, selector: &E::Word, value: &E::Word) -> E::Word {
        let packed = e.add(&e.mul(selector, &e.constant(self.radix)), value);
        e.lookup(&self.table, &packed)
    }
}

/// The mask used when none is chosen explicitly.
#[cfg(not(feature = "lookup_table_mask"))]
pub type DefaultMask = ArithmeticMask;
/// The mask used when none is chosen explicitly.
#[cfg(feature = "lookup_table_mask")]
pub type DefaultMask = LookupMask;
