//! Loading and validating the scripted deal file that drives a match.

use std::collections::HashSet;
use std::path::Path;

use crate::card::{parse_card_sequence, Card};
use crate::error::DealFileError;
use crate::seat::Seat;

/// One scripted round: type, starting seat, and each seat's initial hand.
#[derive(Debug, Clone)]
pub struct Round {
    pub round_type: u8,
    pub starting: Seat,
    /// Indexed the same way the file stores them: N, E, S, W.
    pub hands: [Vec<Card>; 4],
}

impl Round {
    pub fn hand_for(&self, seat: Seat) -> &[Card] {
        &self.hands[Seat::ALL.iter().position(|&s| s == seat).unwrap()]
    }
}

/// The full, ordered sequence of rounds loaded from a deal file.
#[derive(Debug, Clone)]
pub struct DealFile {
    pub rounds: Vec<Round>,
}

pub fn load_deal_file(path: impl AsRef<Path>) -> Result<DealFile, DealFileError> {
    let path_ref = path.as_ref();
    let text = std::fs::read_to_string(path_ref).map_err(|source| DealFileError::Io {
        path: path_ref.display().to_string(),
        source,
    })?;
    parse_deal_file(&text)
}

fn parse_deal_file(text: &str) -> Result<DealFile, DealFileError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return Err(DealFileError::Empty);
    }

    let mut rounds = Vec::new();
    let mut i = 0;
    let mut round_no = 0;
    while i < lines.len() {
        round_no += 1;
        if i + 5 > lines.len() {
            return Err(DealFileError::Truncated { round: round_no });
        }
        let header = lines[i];
        let mut chars = header.chars();
        let round_type = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .filter(|n| (1..=7).contains(n))
            .ok_or(DealFileError::BadHeader {
                round: round_no,
                line: header.to_string(),
                reason: "round type must be a digit 1..7",
            })? as u8;
        let starting = chars
            .next()
            .and_then(Seat::from_letter)
            .ok_or(DealFileError::BadHeader {
                round: round_no,
                line: header.to_string(),
                reason: "starting seat must be one of N,E,S,W",
            })?;
        if chars.next().is_some() {
            return Err(DealFileError::BadHeader {
                round: round_no,
                line: header.to_string(),
                reason: "trailing characters after round type and seat",
            });
        }

        let mut hands: [Vec<Card>; 4] = Default::default();
        for (slot, seat) in Seat::ALL.iter().enumerate() {
            let line = lines[i + 1 + slot];
            let hand = parse_card_sequence(line, 13).map_err(|e| DealFileError::BadHand {
                round: round_no,
                seat: seat.letter(),
                reason: e.to_string(),
            })?;
            let distinct: HashSet<Card> = hand.iter().copied().collect();
            if distinct.len() != 13 {
                return Err(DealFileError::BadHand {
                    round: round_no,
                    seat: seat.letter(),
                    reason: "hand must contain 13 distinct cards".into(),
                });
            }
            hands[slot] = hand;
        }

        rounds.push(Round { round_type, starting, hands });
        i += 5;
    }

    Ok(DealFile { rounds })
}
