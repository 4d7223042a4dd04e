// Copyright (c) 2018-2021 The MobileCoin Foundation

//! Traits for the pieces of an oblivious key-value table, from the pure
//! programs that update the table, to the backends that evaluate them, up to
//! the store that owns the table.
//!
//! Programs are written against `masked_select::Evaluator` so that they have
//! no way to branch on data. A backend turns a program into a `Circuit` which
//! takes and returns plaintext arrays, and may evaluate it however it likes
//! in between (directly, or over encrypted values), as long as the result is
//! the same as evaluating the program directly.
//!
//! There is also a direct-interpreter backend, which is the reference
//! semantics, and generic test drivers.

#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]

use core::fmt::{Debug, Display};

extern crate alloc;
use alloc::{boxed::Box, vec::Vec};

// Re-export some traits we depend on, so that downstream can ensure that they
// have the same version as us.
pub use masked_select::{
    equals_chunks, ArithmeticMask, DefaultMask, Evaluator, LookupMask, LookupTable,
    MaskedSelect, Plaintext,
};
pub use rand_core::{CryptoRng, RngCore};

mod direct;
pub use direct::{DirectBackend, DirectBackendError, DirectCircuit};

mod creators;
pub use creators::*;

pub mod testing;

/// One representative input for a program: one flat array per argument.
pub type Sample = Vec<Vec<u64>>;

/// A pure function of fixed-shape integer arrays.
///
/// Every argument is a flat array whose length is fixed by the program
/// (`input_lens`), and so is the output. `evaluate` may only use the
/// operations offered by the evaluator: no I/O, and no control flow that
/// depends on the words it is handed. Loops over the public shape are fine.
pub trait Program {
    /// A short name for logs and diagnostics
    fn name(&self) -> &'static str;

    /// The length of each argument, in order
    fn input_lens(&self) -> Vec<usize>;

    /// The length of the output
    fn output_len(&self) -> usize;

    /// Evaluate the program.
    ///
    /// Callers must pass exactly `input_lens().len()` arguments with the
    /// declared lengths. The result has length `output_len()`.
    fn evaluate<E: Evaluator>(&self, e: &E, args: &[&[E::Word]]) -> Vec<E::Word>;
}

/// An executable unit produced by an `EvaluationBackend`.
///
/// Takes plaintext arguments and returns the plaintext result; how it gets
/// there (encrypt, evaluate, decrypt) is up to the backend.
pub trait Circuit {
    /// The error type produced
    type Error: Display + Debug;

    /// The name of the program this was compiled from
    fn name(&self) -> &'static str;

    /// Run the circuit.
    ///
    /// Contract: for every valid input, the result equals
    /// `program.evaluate(&Plaintext, args)` for the program it was compiled
    /// from.
    fn run(&mut self, args: &[&[u64]]) -> Result<Vec<u64>, Self::Error>;
}

/// Something which can turn a `Program` into a `Circuit`.
///
/// In tests and in plaintext deployments this is `DirectBackend`. A secure
/// engine would compile the program into a circuit over encrypted values,
/// using the inputset to learn the ranges of intermediate values, and would
/// generate its keys at this point.
pub trait EvaluationBackend {
    /// The error type produced
    type Error: Display + Debug;

    /// Compile a program, given representative samples of its inputs.
    ///
    /// The samples must match the program's declared shape. Backends may
    /// evaluate the program on them.
    #[allow(clippy::type_complexity)]
    fn compile<P>(
        &mut self,
        program: P,
        inputset: &[Sample],
    ) -> Result<Box<dyn Circuit<Error = Self::Error> + Send + Sync>, Self::Error>
    where
        P: Program + Send + Sync + 'static;
}

/// A fixed-capacity key-value store whose operations do not reveal the keys
/// or values they were called with.
///
/// Oblivious here means: the work done, and the order in which the table is
/// touched, are a function of the store's configuration only. Every
/// operation scans the whole table.
///
/// The API is intentionally small:
/// - `insert` puts a pair in the first free row. On a full table it is a
///   silent no-op, because reporting overflow would require branching on the
///   table contents.
/// - `insert` does not check for an existing entry with the same key. Callers
///   who want unique keys must use `replace` for keys they already stored.
/// - `replace` overwrites the value of every row holding the key, and is a
///   no-op when there is none.
/// - `query` returns the value, or `None` if no row holds the key.
///
/// Errors only come from the boundary: a key or value wider than configured,
/// or a failure in the backend.
pub trait ObliviousKvStore {
    /// The error type produced
    type Error: Display + Debug;

    /// The fixed number of rows in the table
    fn capacity(&self) -> u64;

    /// Width of keys in bits
    fn key_bits(&self) -> u32;

    /// Width of values in bits
    fn value_bits(&self) -> u32;

    /// Store a key-value pair in the first free row, if any.
    fn insert(&mut self, key: u64, value: u64) -> Result<(), Self::Error>;

    /// Overwrite the value stored under `key`, if present.
    fn replace(&mut self, key: u64, value: u64) -> Result<(), Self::Error>;

    /// Look up the value stored under `key`.
    ///
    /// If several rows hold the key, the result combines all of their
    /// values (chunk-wise sum); see the store implementation for details.
    fn query(&mut self, key: u64) -> Result<Option<u64>, Self::Error>;
}
