//! Two-party private compromised-credential revealing (PCR).
//!
//! A requester learns whether a candidate secret is known to a responder
//! without disclosing the secret, and the responder discloses nothing about
//! its corpus unless there is a hit. The building blocks are an additively
//! homomorphic EC-ElGamal cryptosystem over the NIST prime curves, a batched
//! non-interactive OR-proof that every encrypted Bloom-filter bit is `+1` or
//! `-1`, and a Bloom filter padded to a fixed popcount so the responder
//! cannot tell real bits from noise.

pub mod bloom;
pub mod cryptographic_primitives;
pub mod elgamal;
pub mod elliptic;
pub mod protocol;

mod test_utils;

pub use crate::elliptic::curves::{CurveId, Point, Scalar};
