//! Typed error surface for the library. Binaries wrap these in `anyhow`.

use thiserror::Error;

/// Errors from parsing/serializing a single protocol message or card.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown message kind")]
    Unknown,
}

/// Errors encountered while loading a deal file.
#[derive(Debug, Error)]
pub enum DealFileError {
    #[error("could not read deal file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("deal file is empty")]
    Empty,
    #[error("round {round} header {line:?}: {reason}")]
    BadHeader {
        round: usize,
        line: String,
        reason: &'static str,
    },
    #[error("round {round} seat {seat}: {reason}")]
    BadHand {
        round: usize,
        seat: char,
        reason: String,
    },
    #[error("round {round} is missing lines (expected 5 per round)")]
    Truncated { round: usize },
}

/// Errors the seat-claim path can report to a connecting peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatTaken;
