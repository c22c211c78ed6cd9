pub mod hashing;
pub mod proofs;
