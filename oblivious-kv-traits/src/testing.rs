// Copyright (c) 2018-2021 The MobileCoin Foundation

//! Some generic tests that exercise objects implementing these traits

use crate::{EvaluationBackend, Evaluator, LookupTable, ObliviousKvStore, Plaintext, Program, Sample};
use alloc::{collections::BTreeMap, vec::Vec};
use core::cell::RefCell;
use rand_core::{CryptoRng, RngCore};

/// Draw a random nonzero key of the store's width.
///
/// The all-zeroes key is skipped: free rows hold zero keys, so key 0 aliases
/// every free row in replace and query.
fn random_key<S: ObliviousKvStore, R: RngCore>(store: &S, rng: &mut R) -> u64 {
    loop {
        let key = rng.next_u64() & width_mask(store.key_bits());
        if key != 0 {
            return key;
        }
    }
}

fn random_value<S: ObliviousKvStore, R: RngCore>(store: &S, rng: &mut R) -> u64 {
    rng.next_u64() & width_mask(store.value_bits())
}

fn width_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Exercise a store by inserting, replacing, and querying a progressively
/// larger set of random keys, checking against a model.
///
/// Keys are never inserted twice, so the model is an ordinary map. Inserts
/// on a full store must be no-ops.
pub fn exercise_kv_store<S, R>(mut num_rounds: usize, store: &mut S, rng: &mut R)
where
    S: ObliviousKvStore,
    R: RngCore + CryptoRng,
{
    let capacity = store.capacity() as usize;
    let mut expected = BTreeMap::<u64, u64>::default();
    let mut probe_positions = Vec::<u64>::new();
    let mut probe_idx = 0usize;

    while num_rounds > 0 {
        if probe_idx >= probe_positions.len() {
            probe_positions.push(random_key(store, rng));
            probe_idx = 0;
        }

        // In one round, do a query from the sequence and a random query
        let query1 = probe_positions[probe_idx];
        let query2 = random_key(store, rng);

        for query in &[query1, query2] {
            assert_eq!(
                store.query(*query).expect("query failed"),
                expected.get(query).copied(),
                "query mismatch before action, key = {}",
                query
            );

            // decide what random action to take
            match rng.next_u32() % 5 {
                // In this case we only READ and continue through the loop
                0 => continue,
                1 | 2 => {
                    // INSERT, unless the key is already there
                    if expected.contains_key(query) {
                        continue;
                    }
                    let new_val = random_value(store, rng);
                    store.insert(*query, new_val).expect("insert failed");
                    if expected.len() < capacity {
                        expected.insert(*query, new_val);
                    }
                }
                _ => {
                    // REPLACE, whether or not the key is there
                    let new_val = random_value(store, rng);
                    store.replace(*query, new_val).expect("replace failed");
                    if let Some(val) = expected.get_mut(query) {
                        *val = new_val;
                    }
                }
            }

            // Finally query the key again as an extra check
            assert_eq!(
                store.query(*query).expect("query failed"),
                expected.get(query).copied(),
                "query mismatch after action, key = {}",
                query
            );
        }

        probe_idx += 1;
        num_rounds -= 1;
    }
}

/// Take an empty store and insert distinct keys until it is full, then check
/// that one more insert is a silent no-op and everything inserted is still
/// there. Returns the number of items stored.
pub fn test_kv_store_overflow<S: ObliviousKvStore>(store: &mut S) -> u64 {
    let capacity = store.capacity();
    let value_mask = width_mask(store.value_bits());

    // count from 1 because 0 aliases free rows
    for idx in 1..=capacity {
        assert_eq!(
            store.query(idx).expect("query failed"),
            None,
            "key present before insert: idx = {}",
            idx
        );
        store.insert(idx, idx & value_mask).expect("insert failed");
        assert_eq!(
            store.query(idx).expect("query failed"),
            Some(idx & value_mask),
            "key missing right after insert: idx = {}",
            idx
        );
    }

    let overflow_key = capacity + 1;
    store
        .insert(overflow_key, 1)
        .expect("insert on a full store must not fail");
    assert_eq!(
        store.query(overflow_key).expect("query failed"),
        None,
        "insert on a full store must be a no-op"
    );

    for idx in 1..=capacity {
        assert_eq!(
            store.query(idx).expect("query failed"),
            Some(idx & value_mask),
            "Failed to find an item that should be in the store: idx = {}",
            idx
        );
    }
    capacity
}

/// Compile a program with a backend, then check on each sample that running
/// the circuit gives the same result as evaluating the program directly.
pub fn check_backend_contract<B, P>(backend: &mut B, program: P, inputset: &[Sample], samples: &[Sample])
where
    B: EvaluationBackend,
    P: Program + Clone + Send + Sync + 'static,
{
    let mut circuit = backend
        .compile(program.clone(), inputset)
        .expect("compile failed");
    for sample in samples {
        let args: Vec<&[u64]> = sample.iter().map(|arg| arg.as_slice()).collect();
        let expected = program.evaluate(&Plaintext, &args);
        assert_eq!(expected.len(), program.output_len());
        assert_eq!(
            circuit.run(&args).expect("run failed"),
            expected,
            "backend disagrees with direct evaluation of {}",
            program.name()
        );
    }
}

/// An evaluator operation, as recorded by `TracingEvaluator`.
///
/// Constants are public, so their values are part of the trace. Lookups
/// record which table was used (by length), never the index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Op {
    /// A constant was lifted
    Constant(u64),
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Equality indicator
    Eq,
    /// Table lookup, in a table of this length
    Lookup(usize),
}

/// A plaintext evaluator that records every operation it performs.
///
/// Two evaluations of a data-oblivious program with the same shape must
/// produce identical traces, whatever the argument values.
#[derive(Debug, Default)]
pub struct TracingEvaluator {
    trace: RefCell<Vec<Op>>,
}

impl TracingEvaluator {
    /// Make an evaluator with an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the evaluator, returning the operations in order
    pub fn into_trace(self) -> Vec<Op> {
        self.trace.into_inner()
    }

    fn record(&self, op: Op) {
        self.trace.borrow_mut().push(op);
    }
}

impl Evaluator for TracingEvaluator {
    type Word = u64;

    fn constant(&self, value: u64) -> u64 {
        self.record(Op::Constant(value));
        Plaintext.constant(value)
    }
    fn add(&self, lhs: &u64, rhs: &u64) -> u64 {
        self.record(Op::Add);
        Plaintext.add(lhs, rhs)
    }
    fn sub(&self, lhs: &u64, rhs: &u64) -> u64 {
        self.record(Op::Sub);
        Plaintext.sub(lhs, rhs)
    }
    fn mul(&self, lhs: &u64, rhs: &u64) -> u64 {
        self.record(Op::Mul);
        Plaintext.mul(lhs, rhs)
    }
    fn eq(&self, lhs: &u64, rhs: &u64) -> u64 {
        self.record(Op::Eq);
        Plaintext.eq(lhs, rhs)
    }
    fn lookup(&self, table: &LookupTable, index: &u64) -> u64 {
        self.record(Op::Lookup(table.len()));
        Plaintext.lookup(table, index)
    }
}

/// Evaluate a program with a `TracingEvaluator`, returning its output and
/// the trace of operations.
pub fn trace_program<P: Program>(program: &P, args: &[&[u64]]) -> (Vec<u64>, Vec<Op>) {
    let e = TracingEvaluator::new();
    let output = program.evaluate(&e, args);
    (output, e.into_trace())
}
