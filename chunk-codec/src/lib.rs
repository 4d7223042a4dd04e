// Copyright (c) 2018-2021 The MobileCoin Foundation

#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! Converts bounded-width unsigned integers to and from fixed-length
//! sequences of small unsigned chunks.
//!
//! A `width`-bit integer is split most-significant-first into
//! `width / chunk_bits` groups of `chunk_bits` bits each, and each group is
//! stored as its own `u64` in `[0, 2^chunk_bits)`. Decoding reads the sequence
//! back as a big-endian base-`2^chunk_bits` numeral.
//!
//! Oblivious table code only ever sees the chunks. All width and range
//! checking happens here, at the boundary, so that nothing inside the table
//! algorithms has to fail.

extern crate alloc;

use alloc::vec::Vec;
use core::{convert::TryFrom, fmt};

/// The largest supported chunk width in bits.
///
/// Masking with a lookup table needs `2 * 2^chunk_bits` entries, so this
/// bounds those tables to 2^17 words.
pub const MAX_CHUNK_BITS: u32 = 16;

/// The largest supported key or value width in bits.
pub const MAX_WIDTH: u32 = 64;

/// Errors at the codec boundary
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CodecError {
    /// A width is zero, too large, or not a multiple of the chunk width.
    InvalidWidth {
        /// The offending width in bits
        width: u32,
        /// The chunk width it was checked against
        chunk_bits: u32,
    },
    /// A value does not fit in its configured width.
    OutOfRange {
        /// The offending value
        value: u64,
        /// The width in bits it was supposed to fit in
        width: u32,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodecError::InvalidWidth { width, chunk_bits } => write!(
                f,
                "invalid width: {} bits cannot be split into {}-bit chunks",
                width, chunk_bits
            ),
            CodecError::OutOfRange { value, width } => {
                write!(f, "value {} does not fit in {} bits", value, width)
            }
        }
    }
}

/// Encoder / decoder for a fixed chunk width.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkCodec {
    chunk_bits: u32,
}

impl ChunkCodec {
    /// Make a codec for chunks of `chunk_bits` bits.
    /// Fails with `InvalidWidth` if `chunk_bits` is 0 or above
    /// `MAX_CHUNK_BITS`.
    pub fn new(chunk_bits: u32) -> Result<Self, CodecError> {
        if chunk_bits == 0 || chunk_bits > MAX_CHUNK_BITS {
            return Err(CodecError::InvalidWidth {
                width: chunk_bits,
                chunk_bits,
            });
        }
        Ok(Self { chunk_bits })
    }

    /// The chunk width in bits
    #[inline]
    pub fn chunk_bits(&self) -> u32 {
        self.chunk_bits
    }

    /// One more than the largest value a single chunk can hold
    #[inline]
    pub fn radix(&self) -> u64 {
        1u64 << self.chunk_bits
    }

    /// Number of chunks needed for a `width`-bit integer.
    /// Fails with `InvalidWidth` unless `0 < width <= MAX_WIDTH` and `width`
    /// is a multiple of the chunk width.
    pub fn chunk_count(&self, width: u32) -> Result<usize, CodecError> {
        if width == 0 || width > MAX_WIDTH || width % self.chunk_bits != 0 {
            return Err(CodecError::InvalidWidth {
                width,
                chunk_bits: self.chunk_bits,
            });
        }
        Ok((width / self.chunk_bits) as usize)
    }

    /// Split `value` into `width / chunk_bits` chunks, most significant
    /// first.
    ///
    /// Examples with 4-bit chunks:
    /// - `encode(10, 4) == [10]`
    /// - `encode(0x1f, 12) == [0, 1, 15]`
    pub fn encode(&self, value: u64, width: u32) -> Result<Vec<u64>, CodecError> {
        let count = self.chunk_count(width)?;
        if width < MAX_WIDTH && value >> width != 0 {
            return Err(CodecError::OutOfRange { value, width });
        }
        let mask = self.radix() - 1;
        Ok((1..=count as u32)
            .map(|idx| (value >> (width - idx * self.chunk_bits)) & mask)
            .collect())
    }

    /// Read chunks back as a big-endian base-`2^chunk_bits` numeral.
    ///
    /// This is the exact inverse of `encode` for in-range chunks. Chunks at or
    /// above the radix (sums produced by aggregating several rows) still get
    /// their positional weight, with wrapping arithmetic.
    pub fn decode(&self, chunks: &[u64]) -> u64 {
        chunks.iter().fold(0u64, |acc, chunk| {
            acc.wrapping_shl(self.chunk_bits).wrapping_add(*chunk)
        })
    }
}

/// Unsigned integer types that can be chunked at their natural width.
pub trait Chunked: Sized + Copy {
    /// The natural width of the type, in bits
    const WIDTH: u32;

    /// Split into `Self::WIDTH / chunk_bits` chunks, most significant first.
    fn to_chunks(&self, chunk_bits: u32) -> Result<Vec<u64>, CodecError>;

    /// Inverse of `to_chunks`.
    /// Fails with `OutOfRange` if the chunks decode to a value wider than
    /// `Self::WIDTH`, or with `InvalidWidth` if there are too many chunks.
    fn from_chunks(chunks: &[u64], chunk_bits: u32) -> Result<Self, CodecError>;
}

// Implements Chunked for u8, u16, etc.
macro_rules! implement_chunked_for_primitive {
    ($uint:ty) => {
        impl Chunked for $uint {
            const WIDTH: u32 = <$uint>::BITS;

            fn to_chunks(&self, chunk_bits: u32) -> Result<Vec<u64>, CodecError> {
                ChunkCodec::new(chunk_bits)?.encode(*self as u64, Self::WIDTH)
            }

            fn from_chunks(chunks: &[u64], chunk_bits: u32) -> Result<Self, CodecError> {
                let codec = ChunkCodec::new(chunk_bits)?;
                let width = chunks.len() as u32 * chunk_bits;
                if width > MAX_WIDTH {
                    return Err(CodecError::InvalidWidth { width, chunk_bits });
                }
                let value = codec.decode(chunks);
                <$uint>::try_from(value).map_err(|_| CodecError::OutOfRange {
                    value,
                    width: Self::WIDTH,
                })
            }
        }
    };
}

implement_chunked_for_primitive!(u8);
implement_chunked_for_primitive!(u16);
implement_chunked_for_primitive!(u32);
implement_chunked_for_primitive!(u64);
