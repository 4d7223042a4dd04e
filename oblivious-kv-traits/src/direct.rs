// Copyright (c) 2018-2021 The MobileCoin Foundation

//! DirectBackend just evaluates programs with `Plaintext`, in the simplest
//! way possible. It does not encrypt anything. Apart from the constant-time
//! operations of `Plaintext`, it has no secrecy properties of its own.
//! This is the reference semantics for other backends, and is suitable for
//! tests and for deployments where the table is not secret.

use super::*;

use alloc::vec;
use core::fmt;

/// Compiles programs to `DirectCircuit`
#[derive(Clone, Debug, Default)]
pub struct DirectBackend {
    /// The number of circuits compiled so far, for diagnostics
    compiled: usize,
}

impl DirectBackend {
    /// Make a new direct backend
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of circuits compiled by this backend
    pub fn compiled(&self) -> usize {
        self.compiled
    }
}

impl EvaluationBackend for DirectBackend {
    type Error = DirectBackendError;

    fn compile<P>(
        &mut self,
        program: P,
        inputset: &[Sample],
    ) -> Result<Box<dyn Circuit<Error = Self::Error> + Send + Sync>, Self::Error>
    where
        P: Program + Send + Sync + 'static,
    {
        if inputset.is_empty() {
            return Err(DirectBackendError::EmptyInputset);
        }
        let input_lens = program.input_lens();
        for sample in inputset {
            let args: Vec<&[u64]> = sample.iter().map(|arg| arg.as_slice()).collect();
            check_shapes(&input_lens, &args)?;
            let output = program.evaluate(&Plaintext, &args);
            if output.len() != program.output_len() {
                return Err(DirectBackendError::OutputMismatch {
                    expected: program.output_len(),
                    actual: output.len(),
                });
            }
        }
        self.compiled += 1;
        Ok(Box::new(DirectCircuit {
            program,
            input_lens,
        }))
    }
}

/// A program paired with the shape it was compiled for
pub struct DirectCircuit<P: Program> {
    program: P,
    input_lens: Vec<usize>,
}

impl<P: Program> Circuit for DirectCircuit<P> {
    type Error = DirectBackendError;

    fn name(&self) -> &'static str {
        self.program.name()
    }

    fn run(&mut self, args: &[&[u64]]) -> Result<Vec<u64>, Self::Error> {
        check_shapes(&self.input_lens, args)?;
        Ok(self.program.evaluate(&Plaintext, args))
    }
}

// Check that arguments have the count and lengths a program declared
fn check_shapes(input_lens: &[usize], args: &[&[u64]]) -> Result<(), DirectBackendError> {
    if input_lens.len() != args.len() {
        return Err(DirectBackendError::ArityMismatch {
            expected: input_lens.len(),
            actual: args.len(),
        });
    }
    for (argument, (expected, arg)) in input_lens.iter().zip(args).enumerate() {
        if *expected != arg.len() {
            return Err(DirectBackendError::ShapeMismatch {
                argument,
                expected: *expected,
                actual: arg.len(),
            });
        }
    }
    Ok(())
}

/// Errors from compiling or running with the direct backend
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DirectBackendError {
    /// Compilation needs at least one representative sample
    EmptyInputset,
    /// Wrong number of arguments
    ArityMismatch {
        /// The number of arguments the program takes
        expected: usize,
        /// The number that was passed
        actual: usize,
    },
    /// An argument had the wrong length
    ShapeMismatch {
        /// Position of the argument
        argument: usize,
        /// The declared length
        expected: usize,
        /// The length that was passed
        actual: usize,
    },
    /// The program returned a different number of words than it declared
    OutputMismatch {
        /// The declared output length
        expected: usize,
        /// The length the program returned
        actual: usize,
    },
}

impl fmt::Display for DirectBackendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DirectBackendError::EmptyInputset => write!(f, "inputset is empty"),
            DirectBackendError::ArityMismatch { expected, actual } => {
                write!(f, "expected {} arguments, got {}", expected, actual)
            }
            DirectBackendError::ShapeMismatch {
                argument,
                expected,
                actual,
            } => write!(
                f,
                "argument {} has length {}, expected {}",
                argument, actual, expected
            ),
            DirectBackendError::OutputMismatch { expected, actual } => write!(
                f,
                "program returned {} words, declared {}",
                actual, expected
            ),
        }
    }
}
