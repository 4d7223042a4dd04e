// Copyright (c) 2018-2021 The MobileCoin Foundation

//! This module defines "factory traits" that create evaluation backends and
//! stores.
//!
//! Factories are useful, as opposed to "new_from_..." traits, because a single
//! generic store may be configured with one of several backends, and a secure
//! backend needs randomness to generate its keys when it is created.
//! The factory is thus a configuration strategy and they naturally chain
//! together: a store creator takes the backend that a backend creator made.

use super::*;

use core::fmt;

/// A factory which makes EvaluationBackend objects of some type
///
/// In case of tests, it may simply create a `DirectBackend`.
/// A secure backend likely generates key material here.
pub trait BackendCreator {
    /// The backend type produced
    type Output: EvaluationBackend + Send + Sync + 'static;
    /// The error type produced
    type Error: Display + Debug;

    /// Create a backend, giving it a CSPRNG for key generation.
    /// In tests this might be seeded.
    fn create<R: RngCore + CryptoRng>(csprng: &mut R) -> Result<Self::Output, Self::Error>;
}

/// DirectBackend needs no keys, and requires no special initialization
pub struct DirectBackendCreator {}

impl BackendCreator for DirectBackendCreator {
    type Output = DirectBackend;
    type Error = DirectBackendCreatorError;

    fn create<R: RngCore + CryptoRng>(_csprng: &mut R) -> Result<Self::Output, Self::Error> {
        Ok(DirectBackend::new())
    }
}

/// There are not actually any failure modes
#[derive(Debug)]
pub enum DirectBackendCreatorError {}

impl fmt::Display for DirectBackendCreatorError {
    fn fmt(&self, _: &mut fmt::Formatter) -> fmt::Result {
        unreachable!()
    }
}

/// A factory which makes ObliviousKvStore objects of some type, on top of a
/// backend
pub trait KvStoreCreator<B: EvaluationBackend> {
    /// The configuration the store is built from
    type Config;
    /// The store type produced
    type Output: ObliviousKvStore + Send + Sync + 'static;

    /// Create a store with an empty table, compiling its circuits with the
    /// given backend.
    fn create(
        config: Self::Config,
        backend: B,
    ) -> Result<Self::Output, <Self::Output as ObliviousKvStore>::Error>;
}
