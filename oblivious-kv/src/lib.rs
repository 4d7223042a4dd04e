// Copyright (c) 2018-2021 The MobileCoin Foundation

//! A fixed-capacity key-value store whose every operation is a single,
//! branch-free scan of the whole table.
//!
//! The table is a flat array of rows, each an occupancy flag followed by the
//! key and the value split into small chunks (see `table`). Insert, replace
//! and query are each a `Program`: a pure function of the table and the
//! chunked arguments, which only adds, multiplies, compares, and looks up
//! small tables. Conditionals are simulated by masking, e.g. a row is
//! written by adding `masked_select(selected, new)` to it, which is zero
//! unless the row was selected.
//!
//! Because the programs never branch on the words they are handed, they can
//! be compiled by any `EvaluationBackend`, including one that evaluates them
//! over encrypted values. The store just owns the current table, encodes
//! arguments at the boundary, runs the compiled circuits, and swaps in the
//! table that comes back.
//!
//! Things to be aware of:
//! - Insert on a full table is a silent no-op.
//! - Keys are not deduplicated. If a key is inserted twice, replace updates
//!   both rows, and query sums the values of both, chunk by chunk.
//! - Free rows are all zeroes and replace/query do not look at the flag, so
//!   the all-zeroes key matches every free row: `replace(0, v)` writes `v`
//!   into free rows, and `query(0)` counts them. A later insert into such a
//!   row adds onto the leftover value. Avoid key 0 if that matters.

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

use alloc::{boxed::Box, vec, vec::Vec};
use chunk_codec::{ChunkCodec, CodecError};
use core::{fmt, marker::PhantomData};
use masked_select::{DefaultMask, MaskedSelect};
use oblivious_kv_traits::{
    Circuit, EvaluationBackend, KvStoreCreator, ObliviousKvStore, Program, Sample,
};

pub mod table;
pub use table::{Row, Table, TableConfig, TableShape};

mod insert;
pub use insert::InsertProgram;

mod replace;
pub use replace::ReplaceProgram;

mod query;
pub use query::QueryProgram;

/// An error from a store operation
#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// A width was invalid, or a key or value did not fit in its width
    Codec(CodecError),
    /// The backend failed to compile or run a circuit
    Backend(E),
    /// A circuit returned the wrong number of words
    MalformedOutput {
        /// The name of the circuit
        circuit: &'static str,
        /// The number of words expected
        expected: usize,
        /// The number of words returned
        actual: usize,
    },
}

impl<E> From<CodecError> for Error<E> {
    fn from(src: CodecError) -> Self {
        Error::Codec(src)
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Codec(err) => write!(f, "codec: {}", err),
            Error::Backend(err) => write!(f, "backend: {}", err),
            Error::MalformedOutput {
                circuit,
                expected,
                actual,
            } => write!(
                f,
                "circuit {} returned {} words, expected {}",
                circuit, actual, expected
            ),
        }
    }
}

type BoxedCircuit<B> = Box<dyn Circuit<Error = <B as EvaluationBackend>::Error> + Send + Sync>;

/// The store: one table, and the three circuits that update and read it.
///
/// `M` picks the masked select used by the programs. The backend is kept
/// for as long as the store lives, since a secure backend owns the keys its
/// circuits were compiled with.
pub struct ScanningKvStore<B: EvaluationBackend, M: MaskedSelect = DefaultMask> {
    shape: TableShape,
    codec: ChunkCodec,
    table: Table,
    backend: B,
    insert: BoxedCircuit<B>,
    replace: BoxedCircuit<B>,
    query: BoxedCircuit<B>,
    _mask: PhantomData<fn() -> M>,
}

impl<B, M> ScanningKvStore<B, M>
where
    B: EvaluationBackend,
    M: MaskedSelect + Send + Sync + 'static,
{
    /// Validate the config, compile the three programs with the backend, and
    /// start from an empty table.
    pub fn new(config: TableConfig, mut backend: B) -> Result<Self, Error<B::Error>> {
        let shape = config.validate()?;
        let codec = ChunkCodec::new(shape.chunk_bits())?;

        let updates = update_inputset(&shape);
        let insert = compile(&mut backend, InsertProgram::<M>::new(shape), &updates)?;
        let replace = compile(&mut backend, ReplaceProgram::<M>::new(shape), &updates)?;
        let query = compile(
            &mut backend,
            QueryProgram::<M>::new(shape),
            &query_inputset(&shape),
        )?;

        tracing::info!(
            capacity = shape.capacity(),
            chunk_bits = shape.chunk_bits(),
            key_chunks = shape.key_chunks(),
            value_chunks = shape.value_chunks(),
            "compiled key-value store circuits"
        );

        Ok(Self {
            shape,
            codec,
            table: Table::new(shape),
            backend,
            insert,
            replace,
            query,
            _mask: PhantomData,
        })
    }

    /// The current table
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The shape of the table
    pub fn shape(&self) -> &TableShape {
        &self.shape
    }

    /// The backend the circuits were compiled with
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn encode_key(&self, key: u64) -> Result<Vec<u64>, CodecError> {
        self.codec.encode(key, self.shape.key_bits())
    }

    fn encode_value(&self, value: u64) -> Result<Vec<u64>, CodecError> {
        self.codec.encode(value, self.shape.value_bits())
    }

    // Run an update circuit and swap in the table it returns
    fn update(
        shape: TableShape,
        circuit: &mut BoxedCircuit<B>,
        table: &mut Table,
        key: &[u64],
        value: &[u64],
    ) -> Result<(), Error<B::Error>> {
        let output = circuit
            .run(&[table.cells(), key, value])
            .map_err(Error::Backend)?;
        *table = Table::from_cells(shape, output).map_err(|cells| Error::MalformedOutput {
            circuit: circuit.name(),
            expected: shape.table_len(),
            actual: cells.len(),
        })?;
        Ok(())
    }
}

fn compile<B, P>(
    backend: &mut B,
    program: P,
    inputset: &[Sample],
) -> Result<BoxedCircuit<B>, Error<B::Error>>
where
    B: EvaluationBackend,
    P: Program + Send + Sync + 'static,
{
    let name = program.name();
    let circuit = backend.compile(program, inputset).map_err(Error::Backend)?;
    tracing::debug!(circuit = name, samples = inputset.len(), "compiled circuit");
    Ok(circuit)
}

/// A table where every word is `word`
fn uniform_table(shape: &TableShape, word: u64) -> Vec<u64> {
    vec![word; shape.table_len()]
}

/// Samples for insert and replace: the all-zeroes and the all-ones table,
/// each with the largest key and value.
fn update_inputset(shape: &TableShape) -> [Sample; 2] {
    let max = shape.radix() - 1;
    [0, 1].map(|word| {
        vec![
            uniform_table(shape, word),
            vec![max; shape.key_chunks()],
            vec![max; shape.value_chunks()],
        ]
    })
}

/// Samples for query, as for the updates but without a value
fn query_inputset(shape: &TableShape) -> [Sample; 2] {
    let max = shape.radix() - 1;
    [0, 1].map(|word| vec![uniform_table(shape, word), vec![max; shape.key_chunks()]])
}

impl<B, M> ObliviousKvStore for ScanningKvStore<B, M>
where
    B: EvaluationBackend,
    M: MaskedSelect + Send + Sync + 'static,
{
    type Error = Error<B::Error>;

    fn capacity(&self) -> u64 {
        self.shape.capacity() as u64
    }

    fn key_bits(&self) -> u32 {
        self.shape.key_bits()
    }

    fn value_bits(&self) -> u32 {
        self.shape.value_bits()
    }

    fn insert(&mut self, key: u64, value: u64) -> Result<(), Self::Error> {
        let key = self.encode_key(key)?;
        let value = self.encode_value(value)?;
        tracing::debug!(capacity = self.shape.capacity(), "insert");
        Self::update(self.shape, &mut self.insert, &mut self.table, &key, &value)
    }

    fn replace(&mut self, key: u64, value: u64) -> Result<(), Self::Error> {
        let key = self.encode_key(key)?;
        let value = self.encode_value(value)?;
        tracing::debug!(capacity = self.shape.capacity(), "replace");
        Self::update(self.shape, &mut self.replace, &mut self.table, &key, &value)
    }

    fn query(&mut self, key: u64) -> Result<Option<u64>, Self::Error> {
        let key = self.encode_key(key)?;
        tracing::debug!(capacity = self.shape.capacity(), "query");
        let output = self
            .query
            .run(&[self.table.cells(), &key[..]])
            .map_err(Error::Backend)?;

        let expected = 1 + self.shape.value_chunks();
        if output.len() != expected {
            return Err(Error::MalformedOutput {
                circuit: self.query.name(),
                expected,
                actual: output.len(),
            });
        }
        // found is a count of matching rows
        if output[0] == 0 {
            return Ok(None);
        }
        Ok(Some(self.codec.decode(&output[1..])))
    }
}

/// Creates `ScanningKvStore` objects on top of a backend
pub struct ScanningKvStoreCreator<M: MaskedSelect = DefaultMask> {
    _mask: PhantomData<fn() -> M>,
}

impl<B, M> KvStoreCreator<B> for ScanningKvStoreCreator<M>
where
    B: EvaluationBackend + Send + Sync + 'static,
    M: MaskedSelect + Send + Sync + 'static,
{
    type Config = TableConfig;
    type Output = ScanningKvStore<B, M>;

    fn create(config: TableConfig, backend: B) -> Result<Self::Output, Error<B::Error>> {
        ScanningKvStore::new(config, backend)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use masked_select::{ArithmeticMask, LookupMask};
    use oblivious_kv_traits::{
        testing, BackendCreator, DirectBackend, DirectBackendCreator, DirectBackendError,
    };
    use test_helper::{get_seeded_rng, run_with_several_seeds};
    use yare::parameterized;

    extern crate std;

    type Store<M> = ScanningKvStore<DirectBackend, M>;

    fn make_store<M>(config: TableConfig) -> Store<M>
    where
        M: MaskedSelect + Send + Sync + 'static,
    {
        let backend = DirectBackendCreator::create(&mut get_seeded_rng()).unwrap();
        <ScanningKvStoreCreator<M> as KvStoreCreator<DirectBackend>>::create(config, backend)
            .unwrap()
    }

    fn end_to_end<M: MaskedSelect + Send + Sync + 'static>() {
        let mut store = make_store::<M>(TableConfig::default());
        assert_eq!(store.capacity(), 5);
        assert_eq!(store.backend().compiled(), 3);

        store.insert(3, 4).unwrap();
        assert_eq!(store.query(3).unwrap(), Some(4));
        store.replace(3, 1).unwrap();
        assert_eq!(store.query(3).unwrap(), Some(1));
        store.insert(25, 40).unwrap();
        assert_eq!(store.query(25).unwrap(), Some(40));
        assert_eq!(store.query(4).unwrap(), None);
        store.replace(3, 5).unwrap();
        assert_eq!(store.query(3).unwrap(), Some(5));
        assert_eq!(store.query(25).unwrap(), Some(40));

        assert_eq!(store.table().check_invariants(), 2);
    }

    #[test]
    fn test_end_to_end_arithmetic_mask() {
        end_to_end::<ArithmeticMask>();
    }

    #[test]
    fn test_end_to_end_lookup_mask() {
        end_to_end::<LookupMask>();
    }

    #[test]
    fn test_end_to_end_single_chunk() {
        let mut store = make_store::<LookupMask>(TableConfig::single_chunk(5, 4));
        store.insert(3, 4).unwrap();
        assert_eq!(store.query(3).unwrap(), Some(4));
        store.replace(3, 1).unwrap();
        assert_eq!(store.query(3).unwrap(), Some(1));
        store.insert(2, 3).unwrap();
        assert_eq!(store.query(2).unwrap(), Some(3));
        assert_eq!(store.query(4).unwrap(), None);
        store.replace(3, 5).unwrap();
        assert_eq!(store.query(3).unwrap(), Some(5));

        assert_eq!(
            store.table().cells(),
            &[1, 3, 5, 1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_insert_on_full_table_is_noop() {
        let mut store = make_store::<ArithmeticMask>(TableConfig::new(4, 4, 8, 8));
        for key in 1..=4 {
            store.insert(key, key * 10).unwrap();
        }
        let before = store.table().clone();
        store.insert(99, 7).unwrap();
        assert_eq!(store.table(), &before);
        assert_eq!(store.query(99).unwrap(), None);
        assert_eq!(store.table().check_invariants(), 4);
    }

    #[test]
    fn test_replace_miss_and_idempotence() {
        let mut store = make_store::<DefaultMask>(TableConfig::default());
        store.insert(17, 1).unwrap();

        let before = store.table().clone();
        store.replace(18, 2).unwrap();
        assert_eq!(store.table(), &before);

        store.replace(17, 2).unwrap();
        let once = store.table().clone();
        store.replace(17, 2).unwrap();
        assert_eq!(store.table(), &once);
        assert_eq!(store.query(17).unwrap(), Some(2));
    }

    #[test]
    fn test_zero_capacity() {
        let mut store = make_store::<ArithmeticMask>(TableConfig::new(0, 4, 32, 32));
        store.insert(1, 1).unwrap();
        assert_eq!(store.query(1).unwrap(), None);
        assert!(store.table().cells().is_empty());
    }

    #[test]
    fn test_boundary_errors() {
        let mut store = make_store::<ArithmeticMask>(TableConfig::new(2, 4, 8, 4));
        assert_eq!(
            store.insert(256, 1),
            Err(Error::Codec(CodecError::OutOfRange {
                value: 256,
                width: 8
            }))
        );
        assert_eq!(
            store.replace(1, 16),
            Err(Error::Codec(CodecError::OutOfRange { value: 16, width: 4 }))
        );
        assert!(store.query(1 << 8).is_err());
        // Nothing reached the table
        assert_eq!(store.table().check_invariants(), 0);

        let backend = DirectBackend::new();
        let result = Store::<ArithmeticMask>::new(TableConfig::new(2, 4, 8, 6), backend);
        assert!(matches!(
            result,
            Err(Error::Codec(CodecError::InvalidWidth {
                width: 6,
                chunk_bits: 4
            }))
        ));
    }

    #[test]
    fn test_error_display() {
        let err: Error<DirectBackendError> = Error::MalformedOutput {
            circuit: "query",
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            std::format!("{}", err),
            "circuit query returned 2 words, expected 3"
        );
    }

    // Keys are not deduplicated, and query sums the matching rows
    #[test]
    fn test_duplicate_keys_aggregate() {
        let mut store = make_store::<ArithmeticMask>(TableConfig::single_chunk(3, 8));
        store.insert(9, 20).unwrap();
        store.insert(9, 22).unwrap();
        assert_eq!(store.table().check_invariants(), 2);
        assert_eq!(store.query(9).unwrap(), Some(42));

        store.replace(9, 5).unwrap();
        assert_eq!(store.query(9).unwrap(), Some(10));
    }

    // Free rows are zeroed, so the zero key matches all of them
    #[test]
    fn test_zero_key_matches_free_rows() {
        let mut store = make_store::<ArithmeticMask>(TableConfig::single_chunk(5, 4));
        assert_eq!(store.query(0).unwrap(), Some(0));

        store.replace(0, 7).unwrap();
        let values: Vec<u64> = store.table().rows().map(|row| row.value()[0]).collect();
        assert_eq!(values, vec![7; 5]);
        assert!(store.table().rows().all(|row| row.flag() == 0));
        assert_eq!(store.query(0).unwrap(), Some(35));
    }

    // Inserting into a row left dirty by the zero key pushes a chunk past the
    // radix. Every later operation must still complete.
    fn insert_over_zero_key_value<M: MaskedSelect + Send + Sync + 'static>() -> Store<M> {
        let mut store = make_store::<M>(TableConfig::single_chunk(5, 4));
        store.replace(0, 9).unwrap();
        store.insert(5, 9).unwrap();
        assert_eq!(store.table().cells()[..3], [1, 5, 18]);
        store
    }

    #[test]
    fn test_insert_over_zero_key_value_arithmetic_mask() {
        let mut store = insert_over_zero_key_value::<ArithmeticMask>();
        assert_eq!(store.query(5).unwrap(), Some(18));
        store.replace(5, 3).unwrap();
        assert_eq!(store.query(5).unwrap(), Some(3));
    }

    #[test]
    fn test_insert_over_zero_key_value_lookup_mask() {
        let mut store = insert_over_zero_key_value::<LookupMask>();
        // The packed index runs past the mask table, which selects 0
        assert_eq!(store.query(5).unwrap(), Some(0));
        store.replace(5, 3).unwrap();
        assert!(store.query(5).is_ok());
        store.insert(6, 1).unwrap();
        assert_eq!(store.query(6).unwrap(), Some(10));
    }

    #[parameterized(
        tiny = { TableConfig::single_chunk(1, 4), 20 },
        single_chunk = { TableConfig::single_chunk(8, 8), 100 },
        default = { TableConfig::default(), 100 },
        wide = { TableConfig::new(16, 8, 64, 64), 100 },
        narrow_chunks = { TableConfig::new(12, 2, 16, 8), 200 },
    )]
    fn exercise_store(config: TableConfig, num_rounds: usize) {
        run_with_several_seeds(|mut rng| {
            let mut store = make_store::<ArithmeticMask>(config);
            testing::exercise_kv_store(num_rounds, &mut store, &mut rng);
            store.table().check_invariants();
        });
        run_with_several_seeds(|mut rng| {
            let mut store = make_store::<LookupMask>(config);
            testing::exercise_kv_store(num_rounds, &mut store, &mut rng);
            store.table().check_invariants();
        });
    }

    #[parameterized(
        one = { TableConfig::single_chunk(1, 4) },
        default = { TableConfig::default() },
        wide = { TableConfig::new(32, 8, 64, 32) },
    )]
    fn overflow_store(config: TableConfig) {
        let mut store = make_store::<DefaultMask>(config);
        assert_eq!(
            testing::test_kv_store_overflow(&mut store),
            config.capacity as u64
        );
        assert_eq!(store.table().check_invariants(), config.capacity);
    }
}
