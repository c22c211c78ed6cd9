//! Adapter over the four NIST prime-order curves.
//!
//! The curve choice travels inside protocol messages, so it is modeled as a
//! closed runtime tag ([`CurveId`]) with a fixed dispatch table into the
//! RustCrypto curve crates, rather than as a type parameter.

use lazy_static::lazy_static;
use num_bigint::BigUint;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

mod point;
mod scalar;

pub use self::point::Point;
pub use self::scalar::Scalar;

lazy_static! {
    static ref P224_ORDER: BigUint =
        order_from_hex("ffffffffffffffffffffffffffff16a2e0b8f03e13dd29455c5c2a3d");
    static ref P256_ORDER: BigUint =
        order_from_hex("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551");
    static ref P384_ORDER: BigUint = order_from_hex(
        "ffffffffffffffffffffffffffffffffffffffffffffffffc7634d81f4372ddf\
         581a0db248b0a77aecec196accc52973"
    );
    static ref P521_ORDER: BigUint = order_from_hex(
        "01ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff\
         fa51868783bf2f966b7fcc0148f709a5d03bb5c9b8899c47aebb6fb71e91386409"
    );
}

fn order_from_hex(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unsupported security parameter (expected 224, 256, 384 or 521)")]
pub struct UnknownCurve;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PointError {
    #[error("failed to deserialize the point")]
    Deserialization,
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("point belongs to a different curve")]
    CurveMismatch,
}

/// One of the NIST prime-order short-Weierstrass curves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurveId {
    P224,
    P256,
    P384,
    P521,
}

impl CurveId {
    pub const ALL: [CurveId; 4] = [CurveId::P224, CurveId::P256, CurveId::P384, CurveId::P521];

    pub fn from_security_param(bits: u16) -> Result<CurveId, UnknownCurve> {
        match bits {
            224 => Ok(CurveId::P224),
            256 => Ok(CurveId::P256),
            384 => Ok(CurveId::P384),
            521 => Ok(CurveId::P521),
            _ => Err(UnknownCurve),
        }
    }

    pub fn security_param(self) -> u16 {
        match self {
            CurveId::P224 => 224,
            CurveId::P256 => 256,
            CurveId::P384 => 384,
            CurveId::P521 => 521,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CurveId::P224 => "P-224",
            CurveId::P256 => "P-256",
            CurveId::P384 => "P-384",
            CurveId::P521 => "P-521",
        }
    }

    /// Byte length of a field element (and of a reduced scalar).
    pub fn field_size(self) -> usize {
        match self {
            CurveId::P224 => 28,
            CurveId::P256 => 32,
            CurveId::P384 => 48,
            CurveId::P521 => 66,
        }
    }

    pub fn group_order(self) -> &'static BigUint {
        match self {
            CurveId::P224 => &P224_ORDER,
            CurveId::P256 => &P256_ORDER,
            CurveId::P384 => &P384_ORDER,
            CurveId::P521 => &P521_ORDER,
        }
    }

    pub fn generator(self) -> Point {
        Point::generator(self)
    }

    pub fn base_mul(self, k: &Scalar) -> Point {
        Point::generator(self).mul(k)
    }

    /// Parses a SEC1-encoded point known to belong to this curve. The single
    /// byte `0x00` decodes to the point at infinity.
    pub fn decode_point(self, bytes: &[u8]) -> Result<Point, PointError> {
        Point::from_bytes_on(self, bytes)
    }
}

impl Serialize for CurveId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.security_param())
    }
}

impl<'de> Deserialize<'de> for CurveId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u16::deserialize(deserializer)?;
        CurveId::from_security_param(bits).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_params_round_trip() {
        for curve in CurveId::ALL {
            assert_eq!(
                CurveId::from_security_param(curve.security_param()).unwrap(),
                curve
            );
        }
        assert!(CurveId::from_security_param(192).is_err());
    }

    #[test]
    fn group_orders_have_expected_size() {
        for curve in CurveId::ALL {
            let order = curve.group_order();
            assert_eq!(((order.bits() as usize) + 7) / 8, curve.field_size());
        }
    }

    #[test]
    fn serializes_as_numeric_security_param() {
        assert_eq!(serde_json::to_string(&CurveId::P384).unwrap(), "384");
        let parsed: CurveId = serde_json::from_str("521").unwrap();
        assert_eq!(parsed, CurveId::P521);
        assert!(serde_json::from_str::<CurveId>("255").is_err());
    }
}
