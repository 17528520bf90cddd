//! LedgerSoak Cryptography
//!
//! Key pairs, address derivation and transaction signatures.

mod keys;
mod sign;

pub use keys::*;
pub use sign::*;
