//! Card representation and textual notation.

use std::fmt;

use crate::error::ProtocolError;

/// One of the four suits. Incomparable except by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    fn letter(self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'C' => Some(Suit::Clubs),
            'D' => Some(Suit::Diamonds),
            'H' => Some(Suit::Hearts),
            'S' => Some(Suit::Spades),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A card: rank 2..14 (11=J, 12=Q, 13=K, 14=A) paired with a suit.
///
/// Ordering for trick comparison is by rank only; `Card` itself does not
/// implement `Ord` because suits are incomparable — comparisons happen
/// within the engine, restricted to cards already known to share a suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub rank: u8,
    pub suit: Suit,
}

impl Card {
    pub const MIN_RANK: u8 = 2;
    pub const MAX_RANK: u8 = 14;

    pub fn new(rank: u8, suit: Suit) -> Self {
        debug_assert!((Self::MIN_RANK..=Self::MAX_RANK).contains(&rank));
        Self { rank, suit }
    }

    pub fn is_king_of_hearts(self) -> bool {
        self.rank == 13 && self.suit == Suit::Hearts
    }

    pub fn is_heart(self) -> bool {
        self.suit == Suit::Hearts
    }

    pub fn is_queen(self) -> bool {
        self.rank == 12
    }

    pub fn is_jack_or_king(self) -> bool {
        self.rank == 11 || self.rank == 13
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            10 => write!(f, "10{}", self.suit),
            11 => write!(f, "J{}", self.suit),
            12 => write!(f, "Q{}", self.suit),
            13 => write!(f, "K{}", self.suit),
            14 => write!(f, "A{}", self.suit),
            n => write!(f, "{n}{}", self.suit),
        }
    }
}

/// Parses exactly one card token (2 or 3 bytes) from the front of `s`,
/// returning the card and the remainder of the string.
pub fn parse_card(s: &str) -> Result<(Card, &str), ProtocolError> {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return Err(ProtocolError::Malformed("empty card token".into()));
    }

    let (rank, rest) = if s.starts_with("10") {
        (10u8, &s[2..])
    } else {
        let c = bytes[0] as char;
        let rank = match c {
            '2'..='9' => c as u8 - b'0',
            'J' => 11,
            'Q' => 12,
            'K' => 13,
            'A' => 14,
            _ => return Err(ProtocolError::Malformed(format!("bad rank '{c}'"))),
        };
        (rank, &s[1..])
    };

    let suit_char = rest
        .chars()
        .next()
        .ok_or_else(|| ProtocolError::Malformed("card missing suit".into()))?;
    let suit = Suit::from_letter(suit_char)
        .ok_or_else(|| ProtocolError::Malformed(format!("bad suit '{suit_char}'")))?;

    Ok((Card::new(rank, suit), &rest[suit_char.len_utf8()..]))
}

/// Parses a back-to-back concatenation of `count` card tokens (no separator).
pub fn parse_card_sequence(mut s: &str, count: usize) -> Result<Vec<Card>, ProtocolError> {
    let mut cards = Vec::with_capacity(count);
    for _ in 0..count {
        let (card, rest) = parse_card(s)?;
        cards.push(card);
        s = rest;
    }
    if !s.is_empty() {
        return Err(ProtocolError::Malformed(format!(
            "trailing data after {count} cards: {s:?}"
        )));
    }
    Ok(cards)
}

pub fn serialize_card_sequence(cards: &[Card]) -> String {
    cards.iter().map(|c| c.to_string()).collect()
}
