use num_bigint::BigUint;
#[cfg(target_pointer_width = "32")]
use p224::elliptic_curve::bigint::U224;
#[cfg(target_pointer_width = "64")]
use p256::elliptic_curve::bigint::U256 as U224;
use p256::elliptic_curve::bigint::{U256, U384, U576};
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{CurveId, PointError, Scalar};

/// An affine point on one of the supported curves, or the point at infinity.
///
/// Every constructor goes through the backing curve crates, so an instance
/// always satisfies the curve equation. Arithmetic between points of
/// different curves is a programming error and panics.
#[derive(Clone, Debug)]
pub enum Point {
    P224(p224::AffinePoint),
    P256(p256::AffinePoint),
    P384(p384::AffinePoint),
    P521(p521::AffinePoint),
}

macro_rules! fixed_width_scalar {
    ($fn_name:ident, $backend:ident, $uint:ty) => {
        fn $fn_name(k: &Scalar) -> $backend::Scalar {
            let bytes = k.to_biguint().to_bytes_be();
            let mut buf = $backend::FieldBytes::default();
            let offset = buf.len() - bytes.len();
            buf[offset..].copy_from_slice(&bytes);
            // The wrapper keeps scalars below the group order, so the
            // reduction is a no-op width conversion.
            <$backend::Scalar as Reduce<$uint>>::reduce_bytes(&buf)
        }
    };
}

fixed_width_scalar!(p224_scalar, p224, U224);
fixed_width_scalar!(p256_scalar, p256, U256);
fixed_width_scalar!(p384_scalar, p384, U384);
fixed_width_scalar!(p521_scalar, p521, U576);

impl Point {
    pub fn curve(&self) -> CurveId {
        match self {
            Point::P224(_) => CurveId::P224,
            Point::P256(_) => CurveId::P256,
            Point::P384(_) => CurveId::P384,
            Point::P521(_) => CurveId::P521,
        }
    }

    /// The point at infinity, i.e. the group's neutral element.
    pub fn zero(curve: CurveId) -> Point {
        match curve {
            CurveId::P224 => Point::P224(p224::AffinePoint::IDENTITY),
            CurveId::P256 => Point::P256(p256::AffinePoint::IDENTITY),
            CurveId::P384 => Point::P384(p384::AffinePoint::IDENTITY),
            CurveId::P521 => Point::P521(p521::AffinePoint::IDENTITY),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Point::P224(p) => p == &p224::AffinePoint::IDENTITY,
            Point::P256(p) => p == &p256::AffinePoint::IDENTITY,
            Point::P384(p) => p == &p384::AffinePoint::IDENTITY,
            Point::P521(p) => p == &p521::AffinePoint::IDENTITY,
        }
    }

    pub fn generator(curve: CurveId) -> Point {
        match curve {
            CurveId::P224 => Point::P224(p224::AffinePoint::GENERATOR),
            CurveId::P256 => Point::P256(p256::AffinePoint::GENERATOR),
            CurveId::P384 => Point::P384(p384::AffinePoint::GENERATOR),
            CurveId::P521 => Point::P521(p521::AffinePoint::GENERATOR),
        }
    }

    pub fn mul(&self, k: &Scalar) -> Point {
        assert_eq!(
            self.curve(),
            k.curve(),
            "scalar belongs to a different curve"
        );
        match self {
            Point::P224(p) => {
                Point::P224((p224::ProjectivePoint::from(*p) * p224_scalar(k)).to_affine())
            }
            Point::P256(p) => {
                Point::P256((p256::ProjectivePoint::from(*p) * p256_scalar(k)).to_affine())
            }
            Point::P384(p) => {
                Point::P384((p384::ProjectivePoint::from(*p) * p384_scalar(k)).to_affine())
            }
            Point::P521(p) => {
                Point::P521((p521::ProjectivePoint::from(*p) * p521_scalar(k)).to_affine())
            }
        }
    }

    pub fn add(&self, other: &Point) -> Point {
        match (self, other) {
            (Point::P224(a), Point::P224(b)) => {
                Point::P224((p224::ProjectivePoint::from(*a) + *b).to_affine())
            }
            (Point::P256(a), Point::P256(b)) => {
                Point::P256((p256::ProjectivePoint::from(*a) + *b).to_affine())
            }
            (Point::P384(a), Point::P384(b)) => {
                Point::P384((p384::ProjectivePoint::from(*a) + *b).to_affine())
            }
            (Point::P521(a), Point::P521(b)) => {
                Point::P521((p521::ProjectivePoint::from(*a) + *b).to_affine())
            }
            _ => panic!("cannot add points of different curves"),
        }
    }

    pub fn neg(&self) -> Point {
        match self {
            Point::P224(p) => Point::P224((-p224::ProjectivePoint::from(*p)).to_affine()),
            Point::P256(p) => Point::P256((-p256::ProjectivePoint::from(*p)).to_affine()),
            Point::P384(p) => Point::P384((-p384::ProjectivePoint::from(*p)).to_affine()),
            Point::P521(p) => Point::P521((-p521::ProjectivePoint::from(*p)).to_affine()),
        }
    }

    /// Affine x coordinate; `None` for the point at infinity.
    pub fn x_coord(&self) -> Option<BigUint> {
        if self.is_zero() {
            return None;
        }
        let bytes = self.to_bytes(false);
        let field = self.curve().field_size();
        Some(BigUint::from_bytes_be(&bytes[1..1 + field]))
    }

    /// Affine y coordinate; `None` for the point at infinity.
    pub fn y_coord(&self) -> Option<BigUint> {
        if self.is_zero() {
            return None;
        }
        let bytes = self.to_bytes(false);
        let field = self.curve().field_size();
        Some(BigUint::from_bytes_be(&bytes[1 + field..]))
    }

    /// SEC1 encoding. The point at infinity encodes as the single byte `0x00`
    /// in both modes and round-trips through [`CurveId::decode_point`].
    pub fn to_bytes(&self, compressed: bool) -> Vec<u8> {
        if self.is_zero() {
            return vec![0x00];
        }
        match self {
            Point::P224(p) => p.to_encoded_point(compressed).as_bytes().to_vec(),
            Point::P256(p) => p.to_encoded_point(compressed).as_bytes().to_vec(),
            Point::P384(p) => p.to_encoded_point(compressed).as_bytes().to_vec(),
            Point::P521(p) => p.to_encoded_point(compressed).as_bytes().to_vec(),
        }
    }

    /// Parses a SEC1-encoded point, inferring the curve from the encoding
    /// length (the eight lengths of the four curves are pairwise distinct).
    /// The point at infinity carries no length information and is only
    /// accepted by [`Point::from_bytes_on`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Point, PointError> {
        let curve = match bytes.len() {
            29 | 57 => CurveId::P224,
            33 | 65 => CurveId::P256,
            49 | 97 => CurveId::P384,
            67 | 133 => CurveId::P521,
            _ => return Err(PointError::Deserialization),
        };
        match curve {
            CurveId::P224 => {
                let encoded = p224::EncodedPoint::from_bytes(bytes)
                    .map_err(|_| PointError::Deserialization)?;
                Option::from(p224::AffinePoint::from_encoded_point(&encoded))
                    .map(Point::P224)
                    .ok_or(PointError::NotOnCurve)
            }
            CurveId::P256 => {
                let encoded = p256::EncodedPoint::from_bytes(bytes)
                    .map_err(|_| PointError::Deserialization)?;
                Option::from(p256::AffinePoint::from_encoded_point(&encoded))
                    .map(Point::P256)
                    .ok_or(PointError::NotOnCurve)
            }
            CurveId::P384 => {
                let encoded = p384::EncodedPoint::from_bytes(bytes)
                    .map_err(|_| PointError::Deserialization)?;
                Option::from(p384::AffinePoint::from_encoded_point(&encoded))
                    .map(Point::P384)
                    .ok_or(PointError::NotOnCurve)
            }
            CurveId::P521 => {
                let encoded = p521::EncodedPoint::from_bytes(bytes)
                    .map_err(|_| PointError::Deserialization)?;
                Option::from(p521::AffinePoint::from_encoded_point(&encoded))
                    .map(Point::P521)
                    .ok_or(PointError::NotOnCurve)
            }
        }
    }

    pub(crate) fn from_bytes_on(curve: CurveId, bytes: &[u8]) -> Result<Point, PointError> {
        if bytes.len() == 1 && bytes[0] == 0x00 {
            return Ok(Point::zero(curve));
        }
        let point = Point::from_bytes(bytes)?;
        if point.curve() != curve {
            return Err(PointError::CurveMismatch);
        }
        Ok(point)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Point) -> bool {
        match (self, other) {
            (Point::P224(a), Point::P224(b)) => a == b,
            (Point::P256(a), Point::P256(b)) => a == b,
            (Point::P384(a), Point::P384(b)) => a == b,
            (Point::P521(a), Point::P521(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.to_bytes(false)))
        } else {
            serializer.serialize_bytes(&self.to_bytes(false))
        }
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = if deserializer.is_human_readable() {
            let encoded = String::deserialize(deserializer)?;
            hex::decode(&encoded).map_err(D::Error::custom)?
        } else {
            Vec::<u8>::deserialize(deserializer)?
        };
        Point::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::test_for_all_curves!(generator_arithmetic);
    fn generator_arithmetic(curve: CurveId) {
        let g = Point::generator(curve);
        assert_eq!(g.add(&g), g.mul(&Scalar::from_u64(curve, 2)));
        assert!(g.add(&g.neg()).is_zero());
        assert!(g.mul(&Scalar::zero(curve)).is_zero());
        assert_eq!(g.add(&Point::zero(curve)), g);
    }

    crate::test_for_all_curves!(mul_distributes_over_add);
    fn mul_distributes_over_add(curve: CurveId) {
        let a = Scalar::random(curve);
        let b = Scalar::random(curve);
        let lhs = curve.base_mul(&a.add(&b));
        let rhs = curve.base_mul(&a).add(&curve.base_mul(&b));
        assert_eq!(lhs, rhs);
    }

    crate::test_for_all_curves!(sec1_round_trip);
    fn sec1_round_trip(curve: CurveId) {
        let p = curve.base_mul(&Scalar::random(curve));
        for compressed in [false, true] {
            let bytes = p.to_bytes(compressed);
            assert_eq!(Point::from_bytes(&bytes).unwrap(), p);
            assert_eq!(curve.decode_point(&bytes).unwrap(), p);
        }
    }

    crate::test_for_all_curves!(infinity_round_trip);
    fn infinity_round_trip(curve: CurveId) {
        let zero = Point::zero(curve);
        assert_eq!(zero.to_bytes(true), vec![0x00]);
        assert!(curve.decode_point(&[0x00]).unwrap().is_zero());
        assert!(zero.x_coord().is_none());
        assert!(zero.y_coord().is_none());
    }

    crate::test_for_all_curves!(off_curve_bytes_are_rejected);
    fn off_curve_bytes_are_rejected(curve: CurveId) {
        let mut bytes = curve.base_mul(&Scalar::random(curve)).to_bytes(false);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(Point::from_bytes(&bytes).is_err());
    }

    #[test]
    fn curve_mismatch_is_detected() {
        let p = CurveId::P256.generator().to_bytes(true);
        assert_eq!(
            CurveId::P384.decode_point(&p),
            Err(PointError::CurveMismatch)
        );
    }

    #[test]
    fn serde_json_round_trip() {
        let p = CurveId::P256.base_mul(&Scalar::random(CurveId::P256));
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(serde_json::from_str::<Point>(&json).unwrap(), p);
    }
}
