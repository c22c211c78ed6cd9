use digest::Digest;
use num_bigint::BigUint;
use num_traits::Zero;
use sha1::Sha1;
use sha2::Sha256;

use crate::elliptic::curves::{CurveId, Point, Scalar};

pub fn sha1(input: &[u8]) -> [u8; 20] {
    Sha1::digest(input).into()
}

pub fn sha256(input: &[u8]) -> [u8; 32] {
    Sha256::digest(input).into()
}

/// [Digest] extension for hashing curve points and big integers.
///
/// Integers are fed as minimal big-endian bytes (nothing for zero) and a
/// point as its `x ‖ y` coordinates in that form; the point at infinity
/// contributes nothing. Both sides of the Fiat-Shamir transform must feed
/// the transcript through this trait so the byte streams agree.
pub trait DigestExt {
    fn input_biguint(&mut self, n: &BigUint);
    fn input_point(&mut self, point: &Point);

    fn chain_biguint(mut self, n: &BigUint) -> Self
    where
        Self: Sized,
    {
        self.input_biguint(n);
        self
    }

    fn chain_point(mut self, point: &Point) -> Self
    where
        Self: Sized,
    {
        self.input_point(point);
        self
    }

    fn result_biguint(self) -> BigUint;

    /// Finalizes and reduces the digest modulo the curve's group order.
    fn result_scalar(self, curve: CurveId) -> Scalar;
}

impl<D: Digest> DigestExt for D {
    fn input_biguint(&mut self, n: &BigUint) {
        if !n.is_zero() {
            self.update(n.to_bytes_be());
        }
    }

    fn input_point(&mut self, point: &Point) {
        if let Some(x) = point.x_coord() {
            self.input_biguint(&x);
        }
        if let Some(y) = point.y_coord() {
            self.input_biguint(&y);
        }
    }

    fn result_biguint(self) -> BigUint {
        BigUint::from_bytes_be(&self.finalize())
    }

    fn result_scalar(self, curve: CurveId) -> Scalar {
        Scalar::from_biguint(curve, self.result_biguint())
    }
}
