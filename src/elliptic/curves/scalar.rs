use num_bigint::BigUint;
use num_traits::Zero;
use rand::RngCore;
use zeroize::Zeroize;

use super::CurveId;

/// An element of the scalar field of one curve, kept reduced modulo the
/// group order at all times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scalar {
    curve: CurveId,
    value: BigUint,
}

impl Scalar {
    pub fn zero(curve: CurveId) -> Scalar {
        Scalar {
            curve,
            value: BigUint::zero(),
        }
    }

    pub fn from_u64(curve: CurveId, value: u64) -> Scalar {
        Scalar::from_biguint(curve, BigUint::from(value))
    }

    /// Negative inputs map to `N - |value|`, so `from_i64(curve, -1)` is the
    /// scalar encoding of minus one.
    pub fn from_i64(curve: CurveId, value: i64) -> Scalar {
        let magnitude = Scalar::from_u64(curve, value.unsigned_abs());
        if value < 0 {
            magnitude.neg()
        } else {
            magnitude
        }
    }

    pub fn from_biguint(curve: CurveId, value: BigUint) -> Scalar {
        Scalar {
            curve,
            value: value % curve.group_order(),
        }
    }

    /// Parses minimal big-endian bytes, reducing modulo the group order.
    /// The empty slice parses to zero, matching [`Scalar::to_bytes`].
    pub fn from_bytes_be(curve: CurveId, bytes: &[u8]) -> Scalar {
        Scalar::from_biguint(curve, BigUint::from_bytes_be(bytes))
    }

    /// Samples uniformly from `[1, N)` by rejection.
    pub fn random(curve: CurveId) -> Scalar {
        let order = curve.group_order();
        let bits = order.bits();
        let mut buf = vec![0u8; ((bits + 7) / 8) as usize];
        let excess = (buf.len() as u64 * 8 - bits) as usize;
        let mut rng = rand::thread_rng();
        loop {
            rng.fill_bytes(&mut buf);
            let candidate = BigUint::from_bytes_be(&buf) >> excess;
            if !candidate.is_zero() && candidate < *order {
                return Scalar {
                    curve,
                    value: candidate,
                };
            }
        }
    }

    pub fn curve(&self) -> CurveId {
        self.curve
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn to_biguint(&self) -> &BigUint {
        &self.value
    }

    /// Minimal big-endian byte encoding; zero encodes as the empty slice,
    /// which is what the Fiat-Shamir transcript expects.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.value.is_zero() {
            Vec::new()
        } else {
            self.value.to_bytes_be()
        }
    }

    pub fn add(&self, other: &Scalar) -> Scalar {
        self.assert_same_curve(other);
        Scalar {
            curve: self.curve,
            value: (&self.value + &other.value) % self.curve.group_order(),
        }
    }

    pub fn sub(&self, other: &Scalar) -> Scalar {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Scalar) -> Scalar {
        self.assert_same_curve(other);
        Scalar {
            curve: self.curve,
            value: (&self.value * &other.value) % self.curve.group_order(),
        }
    }

    pub fn neg(&self) -> Scalar {
        let value = if self.value.is_zero() {
            BigUint::zero()
        } else {
            self.curve.group_order() - &self.value
        };
        Scalar {
            curve: self.curve,
            value,
        }
    }

    fn assert_same_curve(&self, other: &Scalar) {
        assert_eq!(
            self.curve, other.curve,
            "scalars belong to different curves"
        );
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        use std::{ptr, sync::atomic};
        unsafe { ptr::write_volatile(&mut self.value, BigUint::zero()) };
        atomic::fence(atomic::Ordering::SeqCst);
        atomic::compiler_fence(atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    crate::test_for_all_curves!(random_scalars_are_reduced);
    fn random_scalars_are_reduced(curve: CurveId) {
        for _ in 0..32 {
            let s = Scalar::random(curve);
            assert!(!s.is_zero());
            assert!(s.to_biguint() < curve.group_order());
        }
    }

    crate::test_for_all_curves!(negation_cancels);
    fn negation_cancels(curve: CurveId) {
        let s = Scalar::random(curve);
        assert!(s.add(&s.neg()).is_zero());
        assert!(Scalar::zero(curve).neg().is_zero());
    }

    crate::test_for_all_curves!(byte_round_trip);
    fn byte_round_trip(curve: CurveId) {
        let s = Scalar::random(curve);
        assert_eq!(Scalar::from_bytes_be(curve, &s.to_bytes()), s);
        assert!(Scalar::zero(curve).to_bytes().is_empty());
        assert!(Scalar::from_bytes_be(curve, &[]).is_zero());
    }

    #[test]
    fn negative_values_wrap_around() {
        let curve = CurveId::P256;
        let minus_five = Scalar::from_i64(curve, -5);
        assert_eq!(
            minus_five,
            Scalar::zero(curve).sub(&Scalar::from_u64(curve, 5))
        );
        assert!(minus_five.add(&Scalar::from_u64(curve, 5)).is_zero());
    }

    proptest! {
        #[test]
        fn ops_agree_with_wide_integers(a: u64, b: u64) {
            let curve = CurveId::P256;
            let sa = Scalar::from_u64(curve, a);
            let sb = Scalar::from_u64(curve, b);
            let wide = |n: u128| Scalar::from_biguint(curve, BigUint::from(n));
            prop_assert_eq!(sa.add(&sb), wide(a as u128 + b as u128));
            prop_assert_eq!(sa.mul(&sb), wide(a as u128 * b as u128));
            prop_assert_eq!(sa.sub(&sb).add(&sb), sa);
        }
    }
}
