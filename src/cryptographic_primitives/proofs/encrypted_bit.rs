//! Batched OR-proof that a ciphertext encrypts `+1` or `-1`.
//!
//! Each instance is a Chaum-Pedersen style disjunction: the branch matching
//! the actual plaintext is proven honestly while the other branch is
//! simulated, and a single Fiat-Shamir challenge binds the whole vector.
//! The transcript hashes every ciphertext and every commitment in slot
//! order, so the challenge does not depend on how many workers ran.

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ProofError;
use crate::cryptographic_primitives::hashing::DigestExt;
use crate::elgamal::{Ciphertext, PublicKey};
use crate::elliptic::curves::{Point, PointError, Scalar};

/// Proof that one ciphertext encrypts `+1` or `-1`.
///
/// Branch 1 asserts "the plaintext is `-1`" (the verifier works with
/// `C2 + G`), branch 2 asserts "the plaintext is `+1`" (`C2 - G`).
#[derive(Clone, Debug, PartialEq)]
pub struct BitProof {
    pub a1: Point,
    pub b1: Point,
    pub a2: Point,
    pub b2: Point,
    pub d1: Scalar,
    pub d2: Scalar,
    pub r1: Scalar,
    pub r2: Scalar,
}

/// Wire form of [`BitProof`]: SEC1 points, minimal big-endian scalars.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBitProof {
    #[serde(rename = "A1", with = "hex::serde")]
    pub a1: Vec<u8>,
    #[serde(rename = "B1", with = "hex::serde")]
    pub b1: Vec<u8>,
    #[serde(rename = "A2", with = "hex::serde")]
    pub a2: Vec<u8>,
    #[serde(rename = "B2", with = "hex::serde")]
    pub b2: Vec<u8>,
    #[serde(rename = "D1", with = "hex::serde")]
    pub d1: Vec<u8>,
    #[serde(rename = "D2", with = "hex::serde")]
    pub d2: Vec<u8>,
    #[serde(rename = "R1", with = "hex::serde")]
    pub r1: Vec<u8>,
    #[serde(rename = "R2", with = "hex::serde")]
    pub r2: Vec<u8>,
}

impl BitProof {
    pub fn encode(&self, pk: &PublicKey) -> EncodedBitProof {
        let compressed = pk.point_compression;
        EncodedBitProof {
            a1: self.a1.to_bytes(compressed),
            b1: self.b1.to_bytes(compressed),
            a2: self.a2.to_bytes(compressed),
            b2: self.b2.to_bytes(compressed),
            d1: self.d1.to_bytes(),
            d2: self.d2.to_bytes(),
            r1: self.r1.to_bytes(),
            r2: self.r2.to_bytes(),
        }
    }

    pub fn decode(pk: &PublicKey, encoded: &EncodedBitProof) -> Result<BitProof, PointError> {
        let curve = pk.curve;
        Ok(BitProof {
            a1: curve.decode_point(&encoded.a1)?,
            b1: curve.decode_point(&encoded.b1)?,
            a2: curve.decode_point(&encoded.a2)?,
            b2: curve.decode_point(&encoded.b2)?,
            d1: Scalar::from_bytes_be(curve, &encoded.d1),
            d2: Scalar::from_bytes_be(curve, &encoded.d2),
            r1: Scalar::from_bytes_be(curve, &encoded.r1),
            r2: Scalar::from_bytes_be(curve, &encoded.r2),
        })
    }
}

/// Commitments of a single instance before the challenge is known.
struct Commitment {
    a1: Point,
    b1: Point,
    a2: Point,
    b2: Point,
    w: Scalar,
    d_sim: Scalar,
    r_sim: Scalar,
}

fn commit(pk: &PublicKey, ct: &Ciphertext, message: i8) -> Commitment {
    let curve = pk.curve;
    let w = Scalar::random(curve);
    let r_sim = Scalar::random(curve);
    let d_sim = Scalar::random(curve);
    if message == 1 {
        // Branch 1 is simulated, branch 2 is real.
        let c2_plus_g = ct.c2.add(&Point::generator(curve));
        Commitment {
            a1: curve.base_mul(&r_sim).add(&ct.c1.mul(&d_sim)),
            b1: pk.h.mul(&r_sim).add(&c2_plus_g.mul(&d_sim)),
            a2: curve.base_mul(&w),
            b2: pk.h.mul(&w),
            w,
            d_sim,
            r_sim,
        }
    } else {
        // Branch 2 is simulated, branch 1 is real.
        let minus_g = curve.base_mul(&Scalar::from_i64(curve, -1));
        let c2_minus_g = ct.c2.add(&minus_g);
        Commitment {
            a1: curve.base_mul(&w),
            b1: pk.h.mul(&w),
            a2: curve.base_mul(&r_sim).add(&ct.c1.mul(&d_sim)),
            b2: pk.h.mul(&r_sim).add(&c2_minus_g.mul(&d_sim)),
            w,
            d_sim,
            r_sim,
        }
    }
}

fn respond(commitment: Commitment, message: i8, z: &Scalar, challenge: &Scalar) -> BitProof {
    let Commitment {
        a1,
        b1,
        a2,
        b2,
        w,
        d_sim,
        r_sim,
    } = commitment;
    if message == 1 {
        let d2 = challenge.sub(&d_sim);
        let r2 = w.sub(&z.mul(&d2));
        BitProof {
            a1,
            b1,
            a2,
            b2,
            d1: d_sim,
            d2,
            r1: r_sim,
            r2,
        }
    } else {
        let d1 = challenge.sub(&d_sim);
        let r1 = w.sub(&z.mul(&d1));
        BitProof {
            a1,
            b1,
            a2,
            b2,
            d1,
            d2: d_sim,
            r1,
            r2: r_sim,
        }
    }
}

/// Hashes the transcript in slot order: all ciphertexts first, then all
/// commitment quadruples. This layout is normative for interop.
fn derive_challenge<'a>(
    pk: &PublicKey,
    cts: &[Ciphertext],
    commitments: impl Iterator<Item = [&'a Point; 4]>,
) -> Scalar {
    let mut hasher = Sha256::new();
    for ct in cts {
        hasher.input_point(&ct.c1);
        hasher.input_point(&ct.c2);
    }
    for [a1, b1, a2, b2] in commitments {
        hasher.input_point(a1);
        hasher.input_point(b1);
        hasher.input_point(a2);
        hasher.input_point(b2);
    }
    hasher.result_scalar(pk.curve)
}

/// Encrypts a `±1` vector and proves every slot in one batch.
///
/// Returns the ciphertexts, the per-slot proofs and the shared challenge,
/// all indexed by the input position.
pub fn encrypt_batch_with_proof(
    pk: &PublicKey,
    messages: &[i8],
    pool: &ThreadPool,
) -> Result<(Vec<Ciphertext>, Vec<BitProof>, Scalar), ProofError> {
    let curve = pk.curve;

    let encrypted: Vec<(Ciphertext, Scalar)> = pool.install(|| {
        messages
            .par_iter()
            .map(|&m| {
                if m != 1 && m != -1 {
                    return Err(ProofError::InvalidMessageSpace);
                }
                Ok(pk.encrypt_keeping_randomness(&Scalar::from_i64(curve, m as i64)))
            })
            .collect::<Result<_, _>>()
    })?;
    let (cts, zs): (Vec<Ciphertext>, Vec<Scalar>) = encrypted.into_iter().unzip();

    let commitments: Vec<Commitment> = pool.install(|| {
        messages
            .par_iter()
            .zip(cts.par_iter())
            .map(|(&m, ct)| commit(pk, ct, m))
            .collect()
    });

    let challenge = derive_challenge(
        pk,
        &cts,
        commitments.iter().map(|c| [&c.a1, &c.b1, &c.a2, &c.b2]),
    );

    let proofs: Vec<BitProof> = pool.install(|| {
        commitments
            .into_par_iter()
            .zip(messages.par_iter())
            .zip(zs.par_iter())
            .map(|((commitment, &m), z)| respond(commitment, m, z, &challenge))
            .collect()
    });

    Ok((cts, proofs, challenge))
}

fn verify_instance(pk: &PublicKey, ct: &Ciphertext, proof: &BitProof, challenge: &Scalar) -> bool {
    let curve = pk.curve;
    if proof.d1.add(&proof.d2) != *challenge {
        return false;
    }
    if proof.a1 != curve.base_mul(&proof.r1).add(&ct.c1.mul(&proof.d1)) {
        return false;
    }
    let c2_plus_g = ct.c2.add(&Point::generator(curve));
    if proof.b1 != pk.h.mul(&proof.r1).add(&c2_plus_g.mul(&proof.d1)) {
        return false;
    }
    if proof.a2 != curve.base_mul(&proof.r2).add(&ct.c1.mul(&proof.d2)) {
        return false;
    }
    let minus_g = curve.base_mul(&Scalar::from_i64(curve, -1));
    let c2_minus_g = ct.c2.add(&minus_g);
    proof.b2 == pk.h.mul(&proof.r2).add(&c2_minus_g.mul(&proof.d2))
}

/// Verifies a batch: the challenge must re-derive from the transcript and
/// every instance must pass its five checks.
pub fn verify_batch(
    pk: &PublicKey,
    cts: &[Ciphertext],
    proofs: &[BitProof],
    received_challenge: &Scalar,
    pool: &ThreadPool,
) -> Result<(), ProofError> {
    if cts.len() != proofs.len() {
        return Err(ProofError::LengthMismatch);
    }
    let challenge = derive_challenge(
        pk,
        cts,
        proofs.iter().map(|p| [&p.a1, &p.b1, &p.a2, &p.b2]),
    );
    if challenge != *received_challenge {
        return Err(ProofError::ChallengeMismatch);
    }
    pool.install(|| {
        cts.par_iter()
            .zip(proofs.par_iter())
            .enumerate()
            .try_for_each(|(i, (ct, proof))| {
                if verify_instance(pk, ct, proof, &challenge) {
                    Ok(())
                } else {
                    Err(ProofError::InvalidInstance(i))
                }
            })
    })
}
