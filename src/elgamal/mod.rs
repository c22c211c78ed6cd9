//! Additively homomorphic EC-ElGamal.
//!
//! Scalars encrypt "in the exponent": `Encrypt(m) = ([z]G, [m]G + [z]H)`,
//! which makes ciphertext addition add plaintexts. Arbitrary short byte
//! strings are encrypted multiplicatively by embedding them as an
//! x-coordinate on the curve ([`PublicKey::encrypt_mul`]), which is the only
//! form a decryption can turn back into bytes.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use crate::elliptic::curves::{CurveId, Point, PointError, Scalar};

/// Trailing zero bytes appended before embedding a message into an
/// x-coordinate; the linear search below consumes them as an increment
/// space.
pub const PADDING_BYTES: usize = 4;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(rename = "Curve")]
    pub curve: CurveId,
    #[serde(rename = "G")]
    pub g: Point,
    #[serde(rename = "H")]
    pub h: Point,
    #[serde(rename = "PointCompression")]
    pub point_compression: bool,
}

#[derive(Debug)]
pub struct SecretKey {
    curve: CurveId,
    sk: Scalar,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ciphertext {
    pub c1: Point,
    pub c2: Point,
}

/// SEC1 wire form of a ciphertext, compressed or not per the session flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedCiphertext {
    #[serde(rename = "C1", with = "hex::serde")]
    pub c1: Vec<u8>,
    #[serde(rename = "C2", with = "hex::serde")]
    pub c2: Vec<u8>,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ElGamalError {
    #[error("message does not fit the curve's embedding space")]
    MessageTooLong,
    #[error("failed to embed the message into a curve point")]
    EmbeddingFailed,
    #[error("plaintext point does not carry an embedded message")]
    MalformedPlaintext,
    #[error("public key is inconsistent")]
    InvalidPublicKey,
    #[error(transparent)]
    Point(#[from] PointError),
}

/// Generates a fresh key pair: `sk` uniform in `[1, N)`, `H = [sk]G`.
pub fn keygen(curve: CurveId, point_compression: bool) -> (PublicKey, SecretKey) {
    let sk = Scalar::random(curve);
    let g = Point::generator(curve);
    let h = g.mul(&sk);
    let pk = PublicKey {
        curve,
        g,
        h,
        point_compression,
    };
    (pk, SecretKey { curve, sk })
}

impl PublicKey {
    pub fn encrypt(&self, m: &Scalar) -> Ciphertext {
        self.encrypt_keeping_randomness(m).0
    }

    /// Encryption that also hands back the randomness `z`, which the
    /// OR-proof prover needs as its witness.
    pub(crate) fn encrypt_keeping_randomness(&self, m: &Scalar) -> (Ciphertext, Scalar) {
        let z = Scalar::random(self.curve);
        let c1 = self.curve.base_mul(&z);
        let c2 = self.curve.base_mul(m).add(&self.h.mul(&z));
        (Ciphertext { c1, c2 }, z)
    }

    /// Encrypts an arbitrary short byte string by embedding it as a curve
    /// x-coordinate: the message is padded with [`PADDING_BYTES`] zero bytes
    /// and incremented until some `x` decompresses to a point.
    pub fn encrypt_mul(&self, message: &[u8]) -> Result<Ciphertext, ElGamalError> {
        let point = self.embed(message)?;
        let z = Scalar::random(self.curve);
        let c1 = self.curve.base_mul(&z);
        let c2 = point.add(&self.h.mul(&z));
        Ok(Ciphertext { c1, c2 })
    }

    fn embed(&self, message: &[u8]) -> Result<Point, ElGamalError> {
        let field = self.curve.field_size();
        if message.len() + PADDING_BYTES > field {
            return Err(ElGamalError::MessageTooLong);
        }
        let mut padded = message.to_vec();
        padded.extend_from_slice(&[0; PADDING_BYTES]);
        let mut x = BigUint::from_bytes_be(&padded);

        // SEC1 decompression doubles as the "does x have a y" oracle. The
        // increments never carry past the padding, so x keeps its width.
        let mut candidate = vec![0u8; field + 1];
        candidate[0] = 0x02;
        for _ in 0..1u64 << (8 * PADDING_BYTES) {
            let bytes = x.to_bytes_be();
            candidate[1..].fill(0);
            candidate[1 + field - bytes.len()..].copy_from_slice(&bytes);
            if let Ok(point) = self.curve.decode_point(&candidate) {
                return Ok(point);
            }
            x += 1u32;
        }
        Err(ElGamalError::EmbeddingFailed)
    }

    /// Component-wise homomorphic addition; `rerandomize` folds in a fresh
    /// encryption of zero.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext, rerandomize: bool) -> Ciphertext {
        let mut out = Ciphertext {
            c1: a.c1.add(&b.c1),
            c2: a.c2.add(&b.c2),
        };
        if rerandomize {
            let zero = self.encrypt(&Scalar::zero(self.curve));
            out = Ciphertext {
                c1: out.c1.add(&zero.c1),
                c2: out.c2.add(&zero.c2),
            };
        }
        out
    }

    /// Multiplies the plaintext by a random nonzero scalar: zero stays zero,
    /// anything else becomes an encryption of an unpredictable value.
    pub fn scalar_mult_randomizer(&self, a: &Ciphertext, rerandomize: bool) -> Ciphertext {
        let r = Scalar::random(self.curve);
        let mut out = Ciphertext {
            c1: a.c1.mul(&r),
            c2: a.c2.mul(&r),
        };
        if rerandomize {
            let zero = self.encrypt(&Scalar::zero(self.curve));
            out = Ciphertext {
                c1: out.c1.add(&zero.c1),
                c2: out.c2.add(&zero.c2),
            };
        }
        out
    }

    pub fn encode_ciphertext(&self, ct: &Ciphertext) -> EncodedCiphertext {
        EncodedCiphertext {
            c1: ct.c1.to_bytes(self.point_compression),
            c2: ct.c2.to_bytes(self.point_compression),
        }
    }

    pub fn decode_ciphertext(&self, encoded: &EncodedCiphertext) -> Result<Ciphertext, PointError> {
        Ok(Ciphertext {
            c1: self.curve.decode_point(&encoded.c1)?,
            c2: self.curve.decode_point(&encoded.c2)?,
        })
    }

    /// Consistency checks on a key received over the wire: the embedded
    /// points must live on the declared curve and `G` must be its base
    /// point. Decoding already enforced the curve equation.
    pub fn validate(&self) -> Result<(), ElGamalError> {
        if self.g.curve() != self.curve
            || self.h.curve() != self.curve
            || self.g != Point::generator(self.curve)
            || self.h.is_zero()
        {
            return Err(ElGamalError::InvalidPublicKey);
        }
        Ok(())
    }
}

impl SecretKey {
    pub fn curve(&self) -> CurveId {
        self.curve
    }

    /// Recovers the bytes embedded by [`PublicKey::encrypt_mul`]: computes
    /// `C2 + [N - sk]C1` and strips the padding from the x-coordinate.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<u8>, ElGamalError> {
        let point = ct.c2.add(&ct.c1.mul(&self.sk.neg()));
        let x = point.x_coord().ok_or(ElGamalError::MalformedPlaintext)?;
        let bytes = x.to_bytes_be();
        if bytes.len() < PADDING_BYTES {
            return Err(ElGamalError::MalformedPlaintext);
        }
        Ok(bytes[..bytes.len() - PADDING_BYTES].to_vec())
    }

    /// True iff the ciphertext encrypts the scalar zero.
    pub fn decrypt_and_check0(&self, ct: &Ciphertext) -> bool {
        ct.c1.mul(&self.sk) == ct.c2
    }

    /// True iff the ciphertext encrypts the scalar encoded by `test`.
    pub fn decrypt_and_check(&self, ct: &Ciphertext, test: &[u8]) -> bool {
        let m = Scalar::from_bytes_be(self.curve, test);
        ct.c1.mul(&self.sk).add(&self.curve.base_mul(&m)) == ct.c2
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.sk.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::test_for_all_curves!(encrypt_then_check);
    fn encrypt_then_check(curve: CurveId) {
        let (pk, sk) = keygen(curve, true);
        let m = Scalar::from_u64(curve, 77);
        let ct = pk.encrypt(&m);
        assert!(sk.decrypt_and_check(&ct, &m.to_bytes()));
        assert!(!sk.decrypt_and_check(&ct, &Scalar::from_u64(curve, 78).to_bytes()));
    }

    crate::test_for_all_curves!(homomorphic_addition);
    fn homomorphic_addition(curve: CurveId) {
        let (pk, sk) = keygen(curve, false);
        let sum = pk.add(
            &pk.encrypt(&Scalar::from_u64(curve, 20)),
            &pk.encrypt(&Scalar::from_u64(curve, 22)),
            true,
        );
        assert!(sk.decrypt_and_check(&sum, &Scalar::from_u64(curve, 42).to_bytes()));

        let cancelled = pk.add(
            &pk.encrypt(&Scalar::from_i64(curve, -1)),
            &pk.encrypt(&Scalar::from_u64(curve, 1)),
            false,
        );
        assert!(sk.decrypt_and_check0(&cancelled));
    }

    crate::test_for_all_curves!(randomizer_preserves_zero);
    fn randomizer_preserves_zero(curve: CurveId) {
        let (pk, sk) = keygen(curve, true);
        let zero = pk.encrypt(&Scalar::zero(curve));
        assert!(sk.decrypt_and_check0(&zero));
        assert!(sk.decrypt_and_check0(&pk.scalar_mult_randomizer(&zero, false)));
        assert!(sk.decrypt_and_check0(&pk.scalar_mult_randomizer(&zero, true)));

        let nonzero = pk.encrypt(&Scalar::from_u64(curve, 3));
        assert!(!sk.decrypt_and_check0(&pk.scalar_mult_randomizer(&nonzero, false)));
    }

    crate::test_for_all_curves!(byte_message_round_trip);
    fn byte_message_round_trip(curve: CurveId) {
        let (pk, sk) = keygen(curve, true);
        let ct = pk.encrypt_mul(b"Simba").unwrap();
        assert_eq!(sk.decrypt(&ct).unwrap(), b"Simba");
    }

    #[test]
    fn oversized_message_is_rejected() {
        let (pk, _) = keygen(CurveId::P224, false);
        assert_eq!(
            pk.encrypt_mul(&[7u8; 25]).unwrap_err(),
            ElGamalError::MessageTooLong
        );
    }

    crate::test_for_all_curves!(ciphertext_wire_round_trip);
    fn ciphertext_wire_round_trip(curve: CurveId) {
        for compression in [false, true] {
            let (pk, _) = keygen(curve, compression);
            let ct = pk.encrypt(&Scalar::from_u64(curve, 5));
            let decoded = pk.decode_ciphertext(&pk.encode_ciphertext(&ct)).unwrap();
            assert_eq!(decoded, ct);
        }
    }

    #[test]
    fn validate_rejects_foreign_generator() {
        let (mut pk, _) = keygen(CurveId::P256, true);
        pk.g = pk.g.add(&pk.g);
        assert_eq!(pk.validate().unwrap_err(), ElGamalError::InvalidPublicKey);
    }

    #[test]
    fn public_key_survives_json() {
        let (pk, _) = keygen(CurveId::P256, true);
        let json = serde_json::to_string(&pk).unwrap();
        let parsed: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pk);
        parsed.validate().unwrap();
    }
}
