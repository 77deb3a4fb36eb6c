//! <h1>seedrecover</h1>
//!
//! The `seedrecover` crate recovers BIP-0039 seed phrases from imperfect
//! recollection and checks the candidates against Cardano stake addresses.
//!
//! The search handles three kinds of damage, separately or combined:
//! * words that are missing at known or unknown positions,
//! * words with typos, found within a bounded edit distance,
//! * phrases whose order was garbled by copying a rectangular layout
//!   column-major instead of row-major.
//!
//! Candidates that satisfy the BIP-0039 checksum are turned into mainnet
//! stake addresses (Icarus master key, path m/1852'/1815'/0'/2/0) and
//! compared against user-supplied target addresses or the Blockfrost chain
//! oracle.
//!

/// The word_list module provides the default word list and the index on top of it.
pub mod word_list;

/// The edit_distance module provides the Levenshtein distance and token expansion.
pub mod edit_distance;

/// The mnemonic module provides the bitstream packing and checksum validation.
pub mod mnemonic;

/// The candidates module drives the combinatorial enumeration.
pub mod candidates;

/// The derivation module derives Cardano stake addresses.
pub mod derivation;

/// The oracle module decides whether a derived address is a match.
pub mod oracle;

/// The search module wires the stages into a parallel search.
pub mod search;

use std::error::Error;
use std::fmt;

/// The error type for all recovery operations.
#[derive(Debug)]
pub enum RecoveryError {
    /// The word list file is malformed.
    BadWordlist(String),
    /// A word is not in the word list.
    NotInWordlist(String),
    /// The phrase length is illegal or inconsistent with the input.
    InvalidLength(String),
    /// The chain oracle failed temporarily.
    OracleTransient(String),
    /// The chain oracle rejected the API key.
    OracleAuth(String),
    /// A derived child key is degenerate.
    DerivationDegenerate,
    /// A wrapped I/O error.
    IoError(std::io::Error),
    /// A wrapped integer parsing error.
    ParseError(std::num::ParseIntError),
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryError::BadWordlist(message) => write!(f, "Invalid word list: {}", message),
            RecoveryError::NotInWordlist(word) => {
                write!(f, "The word '{}' is not in the word list.", word)
            }
            RecoveryError::InvalidLength(message) => {
                write!(f, "Invalid phrase length: {}", message)
            }
            RecoveryError::OracleTransient(message) => {
                write!(f, "The chain oracle is unavailable: {}", message)
            }
            RecoveryError::OracleAuth(message) => {
                write!(f, "Chain oracle authentication failed: {}", message)
            }
            RecoveryError::DerivationDegenerate => {
                write!(f, "The derived child key is degenerate.")
            }
            RecoveryError::IoError(error) => write!(f, "I/O error: {}", error),
            RecoveryError::ParseError(error) => write!(f, "Parsing error: {}", error),
        }
    }
}

impl Error for RecoveryError {}

impl From<std::io::Error> for RecoveryError {
    fn from(error: std::io::Error) -> Self {
        RecoveryError::IoError(error)
    }
}

impl From<std::num::ParseIntError> for RecoveryError {
    fn from(error: std::num::ParseIntError) -> Self {
        RecoveryError::ParseError(error)
    }
}

/// The result type for all recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

pub use crate::candidates::{compose_slots, select_length, CandidateStream, Slot};
pub use crate::edit_distance::{distance, expand, Expansion};
pub use crate::oracle::{BlockfrostClient, MatchOracle, MatchReason, Target, Verdict};
pub use crate::search::{run, MatchRecord, SearchConfig, SearchOutcome};
pub use crate::word_list::WordList;
