//! Wire grammar: framing and a hand-written tokenizer for every message kind.
//!
//! The distilled source behind this protocol used one compiled regular
//! expression per message kind, duplicated between client and server. Here
//! the grammar is a small character-cursor parser shared by both binaries —
//! every input maps to `Ok(variant)` or `Err(ProtocolError)`, there is no
//! partial-match ambiguity to reason about.

use crate::card::{parse_card, serialize_card_sequence, Card};
use crate::error::ProtocolError;
use crate::seat::Seat;

/// Messages the server may emit (a superset also describes the shape a
/// client's incoming text must take).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Busy { seats: Vec<Seat> },
    Deal { round_type: u8, starting: Seat, hand: Vec<Card> },
    Trick { number: u8, cards: Vec<Card> },
    Taken { number: u8, cards: [Card; 4], winner: Seat },
    Wrong { number: u8 },
    Score { points: [(Seat, u32); 4] },
    Total { points: [(Seat, u32); 4] },
}

/// Messages a client may emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Iam { seat: Seat },
    Trick { number: u8, card: Card },
}

impl std::fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerMessage::Busy { seats } => {
                write!(f, "BUSY")?;
                for s in seats {
                    write!(f, "{s}")?;
                }
                Ok(())
            }
            ServerMessage::Deal { round_type, starting, hand } => {
                write!(f, "DEAL{round_type}{starting}{}", serialize_card_sequence(hand))
            }
            ServerMessage::Trick { number, cards } => {
                write!(f, "TRICK{number}{}", serialize_card_sequence(cards))
            }
            ServerMessage::Taken { number, cards, winner } => {
                write!(f, "TAKEN{number}{}{winner}", serialize_card_sequence(cards))
            }
            ServerMessage::Wrong { number } => write!(f, "WRONG{number}"),
            ServerMessage::Score { points } => {
                write!(f, "SCORE")?;
                for (seat, pts) in points {
                    write!(f, "{seat}{pts}")?;
                }
                Ok(())
            }
            ServerMessage::Total { points } => {
                write!(f, "TOTAL")?;
                for (seat, pts) in points {
                    write!(f, "{seat}{pts}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientMessage::Iam { seat } => write!(f, "IAM{seat}"),
            ClientMessage::Trick { number, card } => write!(f, "TRICK{number}{card}"),
        }
    }
}

fn take_trick_number(s: &str) -> Result<(u8, &str), ProtocolError> {
    // `1[0-3]|[1-9]` — try the two-digit form first.
    if s.len() >= 2 {
        let two = &s[..2];
        if two.starts_with('1') {
            if let Ok(n) = two.parse::<u8>() {
                if (10..=13).contains(&n) {
                    return Ok((n, &s[2..]));
                }
            }
        }
    }
    let c = s.chars().next().ok_or_else(|| ProtocolError::Malformed("missing trick number".into()))?;
    if ('1'..='9').contains(&c) {
        Ok((c as u8 - b'0', &s[1..]))
    } else {
        Err(ProtocolError::Malformed(format!("bad trick number near {s:?}")))
    }
}

fn take_seat(s: &str) -> Result<(Seat, &str), ProtocolError> {
    let c = s.chars().next().ok_or_else(|| ProtocolError::Malformed("missing seat letter".into()))?;
    let seat = Seat::from_letter(c).ok_or_else(|| ProtocolError::Malformed(format!("bad seat '{c}'")))?;
    Ok((seat, &s[1..]))
}

/// Parses a full, already-delimiter-stripped line as a `ClientMessage`
/// (used by the server to interpret inbound traffic).
pub fn parse_client_message(line: &str) -> Result<ClientMessage, ProtocolError> {
    if let Some(rest) = line.strip_prefix("IAM") {
        let (seat, rest) = take_seat(rest)?;
        if !rest.is_empty() {
            return Err(ProtocolError::Malformed("trailing data after IAM".into()));
        }
        return Ok(ClientMessage::Iam { seat });
    }
    if let Some(rest) = line.strip_prefix("TRICK") {
        let (number, rest) = take_trick_number(rest)?;
        let (card, rest) = parse_card(rest)?;
        if !rest.is_empty() {
            return Err(ProtocolError::Malformed("trailing data after TRICK response".into()));
        }
        return Ok(ClientMessage::Trick { number, card });
    }
    Err(ProtocolError::Unknown)
}

/// Parses a full, already-delimiter-stripped line as a `ServerMessage`
/// (used by the client to interpret inbound traffic).
pub fn parse_server_message(line: &str) -> Result<ServerMessage, ProtocolError> {
    if let Some(rest) = line.strip_prefix("BUSY") {
        if rest.is_empty() || rest.len() > 4 {
            return Err(ProtocolError::Malformed("BUSY needs 1..4 seats".into()));
        }
        let mut seats = Vec::with_capacity(rest.len());
        for c in rest.chars() {
            seats.push(Seat::from_letter(c).ok_or_else(|| ProtocolError::Malformed(format!("bad seat '{c}'")))?);
        }
        return Ok(ServerMessage::Busy { seats });
    }
    if let Some(rest) = line.strip_prefix("DEAL") {
        let mut chars = rest.chars();
        let round_type = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .filter(|n| (1..=7).contains(n))
            .ok_or_else(|| ProtocolError::Malformed("bad round type".into()))? as u8;
        let rest = &rest[1..];
        let (starting, rest) = take_seat(rest)?;
        let hand = crate::card::parse_card_sequence(rest, 13)?;
        return Ok(ServerMessage::Deal { round_type, starting, hand });
    }
    if let Some(rest) = line.strip_prefix("TAKEN") {
        let (number, rest) = take_trick_number(rest)?;
        if rest.len() < 5 {
            return Err(ProtocolError::Malformed("TAKEN message too short".into()));
        }
        let cards = crate::card::parse_card_sequence(&rest[..rest.len() - 1], 4)?;
        let (winner, rest) = take_seat(&rest[rest.len() - 1..])?;
        if !rest.is_empty() {
            return Err(ProtocolError::Malformed("trailing data after TAKEN".into()));
        }
        let cards: [Card; 4] = cards.try_into().map_err(|_| ProtocolError::Malformed("TAKEN needs 4 cards".into()))?;
        return Ok(ServerMessage::Taken { number, cards, winner });
    }
    if let Some(rest) = line.strip_prefix("TRICK") {
        let (number, rest) = take_trick_number(rest)?;
        let cards = parse_card_run(rest, 0..=3)?;
        return Ok(ServerMessage::Trick { number, cards });
    }
    if let Some(rest) = line.strip_prefix("WRONG") {
        let (number, rest) = take_trick_number(rest)?;
        if !rest.is_empty() {
            return Err(ProtocolError::Malformed("trailing data after WRONG".into()));
        }
        return Ok(ServerMessage::Wrong { number });
    }
    if let Some(rest) = line.strip_prefix("SCORE") {
        return Ok(ServerMessage::Score { points: parse_four_seat_points(rest)? });
    }
    if let Some(rest) = line.strip_prefix("TOTAL") {
        return Ok(ServerMessage::Total { points: parse_four_seat_points(rest)? });
    }
    Err(ProtocolError::Unknown)
}

/// Parses a run of 0..=3 cards (used by the `TRICK` prompt, whose card count
/// is not explicit in the grammar — it is however many 2/3-byte tokens fit).
fn parse_card_run(mut s: &str, allowed: std::ops::RangeInclusive<usize>) -> Result<Vec<Card>, ProtocolError> {
    let mut cards = Vec::new();
    while !s.is_empty() {
        let (card, rest) = parse_card(s)?;
        cards.push(card);
        s = rest;
    }
    if !allowed.contains(&cards.len()) {
        return Err(ProtocolError::Malformed(format!(
            "expected {}..={} cards, got {}",
            allowed.start(),
            allowed.end(),
            cards.len()
        )));
    }
    Ok(cards)
}

fn parse_four_seat_points(mut s: &str) -> Result<[(Seat, u32); 4], ProtocolError> {
    let mut out = Vec::with_capacity(4);
    for _ in 0..4 {
        let (seat, rest) = take_seat(s)?;
        let digits_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits_len == 0 {
            return Err(ProtocolError::Malformed("missing score digits".into()));
        }
        let points: u32 = rest[..digits_len]
            .parse()
            .map_err(|_| ProtocolError::Malformed("bad score digits".into()))?;
        out.push((seat, points));
        s = &rest[digits_len..];
    }
    if !s.is_empty() {
        return Err(ProtocolError::Malformed("trailing data after 4 seat scores".into()));
    }
    Ok(out.try_into().expect("exactly 4 pushed"))
}

/// CR+LF is the on-wire frame delimiter.
pub const DELIMITER: &str = "\r\n";

/// Extracts the next complete CR+LF-delimited message from `buf`, removing
/// it (and its terminator) from the front of `buf`. Returns `None` if `buf`
/// holds no complete frame yet.
pub fn extract_message(buf: &mut String) -> Option<String> {
    let idx = buf.find(DELIMITER)?;
    let message = buf[..idx].to_string();
    buf.drain(..idx + DELIMITER.len());
    Some(message)
}
