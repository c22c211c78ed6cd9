use thiserror::Error;

pub mod encrypted_bit;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProofError {
    #[error("message is outside the {{+1, -1}} message space")]
    InvalidMessageSpace,
    #[error("ciphertext and proof vectors differ in length")]
    LengthMismatch,
    #[error("challenge does not match the commitments")]
    ChallengeMismatch,
    #[error("proof instance {0} failed verification")]
    InvalidInstance(usize),
}
