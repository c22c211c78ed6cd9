//! The PCR protocol engine.
//!
//! Message flow: the requester builds a popcount-padded Bloom filter over
//! its hashed password, encrypts every bit as `±1` with a batched OR-proof
//! ([`query_gen`]), the responder verifies the proof and aggregates the
//! encrypted filter ([`resp_deployment`]), then folds in its candidate
//! password ([`response_gen`]); finally the requester opens the result
//! ([`response_decrypt`]). `Z1` decrypts to zero exactly when the candidate
//! hashes into bits the requester encrypted as `+1`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bloom::BloomFilter;
use crate::cryptographic_primitives::hashing;
use crate::cryptographic_primitives::proofs::encrypted_bit::{
    self, BitProof, EncodedBitProof,
};
use crate::cryptographic_primitives::proofs::ProofError;
use crate::elgamal::{
    self, Ciphertext, ElGamalError, EncodedCiphertext, PublicKey, SecretKey,
};
use crate::elliptic::curves::{CurveId, PointError, Scalar};

pub mod codec;

/// Requester-side protocol parameters, fixed for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqPara {
    #[serde(rename = "Params")]
    pub curve: CurveId,
    #[serde(rename = "BfLength")]
    pub bf_length: usize,
    #[serde(rename = "BfNumOnes")]
    pub bf_num_ones: usize,
    #[serde(rename = "NumHashFuncs")]
    pub num_hash_funcs: usize,
    #[serde(rename = "NumThreads")]
    pub num_threads: usize,
    #[serde(rename = "PointCompression")]
    pub point_compression: bool,
}

/// Requester → responder: the encrypted Bloom filter with its batched proof.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryMessage {
    #[serde(rename = "BfLength")]
    pub bf_length: usize,
    #[serde(rename = "BfNumOnes")]
    pub bf_num_ones: usize,
    #[serde(rename = "NumHashFuncs")]
    pub num_hash_funcs: usize,
    #[serde(rename = "NumThreads")]
    pub num_threads: usize,
    #[serde(rename = "PointCompression")]
    pub point_compression: bool,
    #[serde(rename = "PK")]
    pub pk: PublicKey,
    #[serde(rename = "EBF")]
    pub ebf: Vec<EncodedCiphertext>,
    #[serde(rename = "ZKPs")]
    pub zkps: Vec<EncodedBitProof>,
    #[serde(rename = "Challenge", with = "hex::serde")]
    pub challenge: Vec<u8>,
}

/// The verified query after responder-side aggregation: the original
/// encrypted filter plus the aggregate ciphertext whose plaintext is zero
/// for an honest requester.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryMessagePlus {
    #[serde(rename = "BfLength")]
    pub bf_length: usize,
    #[serde(rename = "BfNumOnes")]
    pub bf_num_ones: usize,
    #[serde(rename = "NumHashFuncs")]
    pub num_hash_funcs: usize,
    #[serde(rename = "NumThreads")]
    pub num_threads: usize,
    #[serde(rename = "PointCompression")]
    pub point_compression: bool,
    #[serde(rename = "PK")]
    pub pk: PublicKey,
    #[serde(rename = "EBF")]
    pub ebf: Vec<EncodedCiphertext>,
    #[serde(rename = "C1")]
    pub c1: EncodedCiphertext,
}

/// Responder → requester: `Z1` opens to zero on a hit, `Z2` carries the
/// candidate for the reveal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(rename = "Z1")]
    pub z1: EncodedCiphertext,
    #[serde(rename = "Z2")]
    pub z2: EncodedCiphertext,
}

/// Outcome of opening a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The candidate is known to both parties; carries its bytes.
    Match(Vec<u8>),
    NoMatch,
    /// `Z1` opened to zero but the revealed bytes are not in the
    /// requester's filter: the responder fabricated a hit.
    ResponderCheating,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Match(_))
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOutcome::Match(payload) => write!(f, "{}", String::from_utf8_lossy(payload)),
            MatchOutcome::NoMatch => Ok(()),
            MatchOutcome::ResponderCheating => f.write_str("Responder is cheating!"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PcrError {
    #[error("Invalid ZKP!")]
    InvalidZkp(#[source] ProofError),
    #[error("Invalid message space!")]
    InvalidMessageSpace,
    #[error("message shape does not match its declared parameters")]
    MalformedMessage,
    #[error(transparent)]
    Point(#[from] PointError),
    #[error(transparent)]
    ElGamal(#[from] ElGamalError),
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<ProofError> for PcrError {
    fn from(err: ProofError) -> PcrError {
        match err {
            ProofError::InvalidMessageSpace => PcrError::InvalidMessageSpace,
            other => PcrError::InvalidZkp(other),
        }
    }
}

fn worker_pool(num_threads: usize) -> Result<ThreadPool, PcrError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()?)
}

/// Requester initialization: key generation plus parameter packaging.
///
/// # Panics
/// Panics if `bf_length` is not a positive multiple of 8 or if
/// `bf_num_ones` exceeds it; the popcount padding could not terminate
/// otherwise.
pub fn req_init(
    curve: CurveId,
    bf_length: usize,
    bf_num_ones: usize,
    num_hash_funcs: usize,
    num_threads: usize,
    point_compression: bool,
) -> (PublicKey, SecretKey, ReqPara) {
    assert!(
        bf_length > 0 && bf_length % 8 == 0,
        "filter length must be a positive multiple of 8"
    );
    assert!(
        bf_num_ones <= bf_length,
        "target popcount cannot exceed the filter length"
    );
    let (pk, sk) = elgamal::keygen(curve, point_compression);
    let para = ReqPara {
        curve,
        bf_length,
        bf_num_ones,
        num_hash_funcs,
        num_threads: num_threads.max(1),
        point_compression,
    };
    (pk, sk, para)
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Builds the requester's Bloom filter over `sha256(password)` and pads its
/// popcount up to `bf_num_ones`, hiding the true query multiplicity.
///
/// The padding bits only disguise which bits are live, so they come from a
/// plain PRNG seeded with the wall clock, not from the cryptographic
/// sampler used everywhere else.
pub fn req_bf_gen(para: &ReqPara, password: &str) -> BloomFilter {
    let hashed = hashing::sha256(password.as_bytes());
    let mut bf = BloomFilter::new(para.bf_length, para.num_hash_funcs);
    bf.add(&hashed);

    let mut rng = SmallRng::seed_from_u64(clock_seed());
    while bf.count_ones() < para.bf_num_ones {
        let mask = 1u8 << rng.gen_range(0..8);
        let index = rng.gen_range(0..para.bf_length / 8);
        bf.or_byte(index, mask);
    }
    bf
}

/// Maps every filter bit to `±1`, encrypts the vector with its batched
/// proof and packages the wire message.
pub fn query_gen(
    pk: &PublicKey,
    para: &ReqPara,
    bf: &BloomFilter,
) -> Result<QueryMessage, PcrError> {
    let pool = worker_pool(para.num_threads)?;
    let messages: Vec<i8> = (0..para.bf_length)
        .map(|i| if bf.test_locations(&[i as u64]) { 1 } else { -1 })
        .collect();

    let (ebf, zkps, challenge) = encrypt_with_proof(pk, &messages, &pool)?;
    let (ebf, zkps): (Vec<EncodedCiphertext>, Vec<EncodedBitProof>) = pool.install(|| {
        ebf.par_iter()
            .zip(zkps.par_iter())
            .map(|(ct, proof)| (pk.encode_ciphertext(ct), proof.encode(pk)))
            .unzip()
    });

    Ok(QueryMessage {
        bf_length: para.bf_length,
        bf_num_ones: para.bf_num_ones,
        num_hash_funcs: para.num_hash_funcs,
        num_threads: para.num_threads,
        point_compression: para.point_compression,
        pk: pk.clone(),
        ebf,
        zkps,
        challenge: challenge.to_bytes(),
    })
}

fn encrypt_with_proof(
    pk: &PublicKey,
    messages: &[i8],
    pool: &ThreadPool,
) -> Result<(Vec<Ciphertext>, Vec<BitProof>, Scalar), PcrError> {
    encrypted_bit::encrypt_batch_with_proof(pk, messages, pool).map_err(PcrError::from)
}

/// Responder-side verification and aggregation.
///
/// Decodes the query, verifies the batched proof, and attaches the
/// homomorphic aggregate `Σ EBF[i] + Encrypt(m - 2·bf_num_ones)` whose
/// plaintext is zero whenever the requester was honest.
pub fn resp_deployment(query: &QueryMessage) -> Result<QueryMessagePlus, PcrError> {
    let pk = &query.pk;
    pk.validate()?;
    if query.ebf.len() != query.bf_length || query.zkps.len() != query.ebf.len() {
        return Err(PcrError::MalformedMessage);
    }
    let pool = worker_pool(query.num_threads)?;

    let decoded: Vec<(Ciphertext, BitProof)> = pool.install(|| {
        query
            .ebf
            .par_iter()
            .zip(query.zkps.par_iter())
            .map(|(ct, proof)| -> Result<_, PointError> {
                Ok((pk.decode_ciphertext(ct)?, BitProof::decode(pk, proof)?))
            })
            .collect::<Result<_, _>>()
    })?;
    let (ebf, zkps): (Vec<Ciphertext>, Vec<BitProof>) = decoded.into_iter().unzip();

    let challenge = Scalar::from_bytes_be(pk.curve, &query.challenge);
    encrypted_bit::verify_batch(pk, &ebf, &zkps, &challenge, &pool).map_err(PcrError::from)?;

    let inv_sum = Scalar::from_i64(
        pk.curve,
        query.bf_length as i64 - 2 * query.bf_num_ones as i64,
    );
    let enc_inv_sum = pk.encrypt(&inv_sum);
    let mut aggregate = pk.encrypt(&Scalar::zero(pk.curve));
    for ct in &ebf {
        aggregate = pk.add(&aggregate, ct, false);
    }
    aggregate = pk.add(&aggregate, &enc_inv_sum, false);

    Ok(QueryMessagePlus {
        bf_length: query.bf_length,
        bf_num_ones: query.bf_num_ones,
        num_hash_funcs: query.num_hash_funcs,
        num_threads: query.num_threads,
        point_compression: query.point_compression,
        pk: pk.clone(),
        ebf: query.ebf.clone(),
        c1: pk.encode_ciphertext(&aggregate),
    })
}

/// Responder's answer for one candidate password.
///
/// For every index its own (unpadded) filter sets, the responder computes
/// `Encrypt(-1) + EBF[i]`, an encryption of zero exactly when the requester
/// encrypted `+1` there, and folds it through a scalar-mult randomizer into
/// a running sum. Workers cover contiguous ranges and their partial sums
/// are reduced sequentially, so the result never depends on scheduling.
pub fn response_gen(
    query_plus: &QueryMessagePlus,
    candidate: &str,
) -> Result<ResponseMessage, PcrError> {
    let pk = &query_plus.pk;
    pk.validate()?;
    if query_plus.ebf.len() != query_plus.bf_length {
        return Err(PcrError::MalformedMessage);
    }
    let pool = worker_pool(query_plus.num_threads)?;
    let curve = pk.curve;

    let hashed = hashing::sha256(candidate.as_bytes());
    let enc_candidate = pk.encrypt_mul(candidate.as_bytes())?;

    let mut bf = BloomFilter::new(query_plus.bf_length, query_plus.num_hash_funcs);
    bf.add(&hashed);

    let num_threads = query_plus.num_threads.max(1);
    let chunk = query_plus.bf_length / num_threads;
    let ranges: Vec<(usize, usize)> = (0..num_threads)
        .map(|t| {
            let end = if t + 1 == num_threads {
                query_plus.bf_length
            } else {
                (t + 1) * chunk
            };
            (t * chunk, end)
        })
        .collect();

    let partials: Vec<Ciphertext> = pool.install(|| {
        ranges
            .par_iter()
            .map(|&(start, end)| -> Result<Ciphertext, PcrError> {
                let minus_one = Scalar::from_i64(curve, -1);
                let mut acc = pk.encrypt(&Scalar::zero(curve));
                for i in start..end {
                    if !bf.test_locations(&[i as u64]) {
                        continue;
                    }
                    let slot = pk.decode_ciphertext(&query_plus.ebf[i])?;
                    let should_be_zero = pk.add(&pk.encrypt(&minus_one), &slot, false);
                    let masked = pk.scalar_mult_randomizer(&should_be_zero, false);
                    acc = pk.add(&acc, &masked, false);
                }
                Ok(acc)
            })
            .collect::<Result<_, _>>()
    })?;

    let mut c2 = pk.encrypt(&Scalar::zero(curve));
    for partial in &partials {
        c2 = pk.add(&c2, partial, false);
    }

    let c1 = pk.decode_ciphertext(&query_plus.c1)?;
    let c1 = pk.scalar_mult_randomizer(&c1, false);
    let s = pk.add(&c1, &c2, false);

    let z1 = pk.scalar_mult_randomizer(&s, false);
    let z2 = pk.add(&s, &enc_candidate, false);
    Ok(ResponseMessage {
        z1: pk.encode_ciphertext(&z1),
        z2: pk.encode_ciphertext(&z2),
    })
}

/// Opens a response. `Z1` must decrypt to zero for a hit; the revealed
/// payload is then checked against the requester's own filter, catching a
/// responder that fabricates matches.
pub fn response_decrypt(
    pk: &PublicKey,
    sk: &SecretKey,
    response: &ResponseMessage,
    bf: &BloomFilter,
) -> Result<MatchOutcome, PcrError> {
    let z1 = pk.decode_ciphertext(&response.z1)?;
    if !sk.decrypt_and_check0(&z1) {
        return Ok(MatchOutcome::NoMatch);
    }
    let z2 = pk.decode_ciphertext(&response.z2)?;
    // A Z2 that decrypts to garbage is as much a fabricated hit as a
    // payload outside the filter.
    let payload = match sk.decrypt(&z2) {
        Ok(payload) => payload,
        Err(_) => return Ok(MatchOutcome::ResponderCheating),
    };
    if bf.test(&hashing::sha256(&payload)) {
        Ok(MatchOutcome::Match(payload))
    } else {
        Ok(MatchOutcome::ResponderCheating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elliptic::curves::Scalar;

    const BF_LENGTH: usize = 128;
    const BF_NUM_ONES: usize = 30;
    const NUM_HASH_FUNCS: usize = 20;
    const NUM_THREADS: usize = 4;

    fn setup(password: &str) -> (PublicKey, SecretKey, ReqPara, BloomFilter) {
        let (pk, sk, para) = req_init(
            CurveId::P256,
            BF_LENGTH,
            BF_NUM_ONES,
            NUM_HASH_FUNCS,
            NUM_THREADS,
            true,
        );
        let bf = req_bf_gen(&para, password);
        (pk, sk, para, bf)
    }

    #[test]
    fn filter_is_padded_to_target_popcount() {
        let (_, _, _, bf) = setup("Simba");
        assert_eq!(bf.count_ones(), BF_NUM_ONES);
    }

    #[test]
    fn matching_candidate_is_revealed() {
        let (pk, sk, para, bf) = setup("Simba");
        let query = query_gen(&pk, &para, &bf).unwrap();
        let deployed = resp_deployment(&query).unwrap();
        let response = response_gen(&deployed, "Simba").unwrap();
        let outcome = response_decrypt(&pk, &sk, &response, &bf).unwrap();
        assert_eq!(outcome, MatchOutcome::Match(b"Simba".to_vec()));
        assert_eq!(outcome.to_string(), "Simba");
    }

    #[test]
    fn non_matching_candidate_stays_hidden() {
        let (pk, sk, para, bf) = setup("Simba");
        let query = query_gen(&pk, &para, &bf).unwrap();
        let deployed = resp_deployment(&query).unwrap();
        let response = response_gen(&deployed, "Nala").unwrap();
        let outcome = response_decrypt(&pk, &sk, &response, &bf).unwrap();
        assert_eq!(outcome, MatchOutcome::NoMatch);
        assert!(!outcome.is_match());
    }

    #[test]
    fn tampered_query_is_rejected() {
        let (pk, _, para, bf) = setup("Simba");
        let mut query = query_gen(&pk, &para, &bf).unwrap();
        // Replace one encrypted bit with a different valid curve point.
        query.ebf[5].c2 = pk
            .curve
            .base_mul(&Scalar::from_u64(pk.curve, 9))
            .to_bytes(para.point_compression);
        match resp_deployment(&query) {
            Err(PcrError::InvalidZkp(_)) => {}
            other => panic!("expected an invalid-ZKP error, got {:?}", other.err()),
        }
    }

    #[test]
    fn cheating_responder_is_detected() {
        let (pk, sk, _, bf) = setup("Simba");
        let forged = ResponseMessage {
            z1: pk.encode_ciphertext(&pk.encrypt(&Scalar::zero(pk.curve))),
            z2: pk.encode_ciphertext(&pk.encrypt_mul(b"Malory").unwrap()),
        };
        let outcome = response_decrypt(&pk, &sk, &forged, &bf).unwrap();
        assert_eq!(outcome, MatchOutcome::ResponderCheating);
        assert_eq!(outcome.to_string(), "Responder is cheating!");
    }

    #[test]
    fn queries_are_rerandomized() {
        let (pk, _, para, bf) = setup("Simba");
        let first = query_gen(&pk, &para, &bf).unwrap();
        let second = query_gen(&pk, &para, &bf).unwrap();
        assert_ne!(first.ebf, second.ebf);
        resp_deployment(&first).unwrap();
        resp_deployment(&second).unwrap();
    }

    #[test]
    fn worker_count_does_not_affect_acceptance() {
        let (pk, _, mut para, bf) = setup("Simba");
        para.num_threads = 1;
        let mut query = query_gen(&pk, &para, &bf).unwrap();
        query.num_threads = 3;
        resp_deployment(&query).unwrap();
    }

    proptest::proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(16))]
        #[test]
        fn padding_always_lands_exactly(password in "[a-zA-Z]{1,12}", target in 20usize..=60) {
            let (_, _, para) = req_init(CurveId::P256, 128, target, 5, 2, false);
            let bf = req_bf_gen(&para, &password);
            proptest::prop_assert_eq!(bf.count_ones(), target);
        }
    }
}
