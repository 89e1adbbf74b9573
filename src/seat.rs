//! The four fixed seats and the table that tracks their state.

use std::fmt;

use crate::card::Card;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    North,
    East,
    South,
    West,
}

impl Seat {
    pub const ALL: [Seat; 4] = [Seat::North, Seat::East, Seat::South, Seat::West];

    pub fn letter(self) -> char {
        match self {
            Seat::North => 'N',
            Seat::East => 'E',
            Seat::South => 'S',
            Seat::West => 'W',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'N' => Some(Seat::North),
            'E' => Some(Seat::East),
            'S' => Some(Seat::South),
            'W' => Some(Seat::West),
            _ => None,
        }
    }

    /// The seat-to-successor map: N→E→S→W→N.
    pub fn next(self) -> Self {
        match self {
            Seat::North => Seat::East,
            Seat::East => Seat::South,
            Seat::South => Seat::West,
            Seat::West => Seat::North,
        }
    }

    /// Number of `next()` steps from `self` to `other`, in 0..4.
    pub fn offset_from(self, other: Seat) -> u8 {
        let mut seat = other;
        let mut n = 0;
        while seat != self {
            seat = seat.next();
            n += 1;
        }
        n
    }

    fn index(self) -> usize {
        match self {
            Seat::North => 0,
            Seat::East => 1,
            Seat::South => 2,
            Seat::West => 3,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Per-seat state owned by the server's match engine.
#[derive(Debug, Clone, Default)]
pub struct SeatState {
    pub hand: Vec<Card>,
    pub round_score: u32,
    pub total_score: u32,
}

impl SeatState {
    pub fn has_card(&self, card: Card) -> bool {
        self.hand.contains(&card)
    }

    pub fn has_suit(&self, suit: crate::card::Suit) -> bool {
        self.hand.iter().any(|c| c.suit == suit)
    }

    pub fn remove_card(&mut self, card: Card) {
        if let Some(pos) = self.hand.iter().position(|&c| c == card) {
            self.hand.remove(pos);
        }
    }
}

/// The four seats, indexed by `Seat`. `conn` identifies the currently bound
/// connection, generic over whatever id type the transport layer uses.
#[derive(Debug, Clone)]
pub struct SeatTable<ConnId> {
    state: [SeatState; 4],
    conn: [Option<ConnId>; 4],
}

impl<ConnId: Copy + PartialEq> Default for SeatTable<ConnId> {
    fn default() -> Self {
        Self {
            state: Default::default(),
            conn: [None; 4],
        }
    }
}

impl<ConnId: Copy + PartialEq> SeatTable<ConnId> {
    pub fn get(&self, seat: Seat) -> &SeatState {
        &self.state[seat.index()]
    }

    pub fn get_mut(&mut self, seat: Seat) -> &mut SeatState {
        &mut self.state[seat.index()]
    }

    pub fn is_vacant(&self, seat: Seat) -> bool {
        self.conn[seat.index()].is_none()
    }

    pub fn conn_of(&self, seat: Seat) -> Option<ConnId> {
        self.conn[seat.index()]
    }

    pub fn seat_of(&self, conn: ConnId) -> Option<Seat> {
        Seat::ALL.into_iter().find(|&s| self.conn[s.index()] == Some(conn))
    }

    pub fn bind(&mut self, seat: Seat, conn: ConnId) {
        self.conn[seat.index()] = Some(conn);
    }

    pub fn vacate(&mut self, seat: Seat) {
        self.conn[seat.index()] = None;
    }

    pub fn all_bound(&self) -> bool {
        self.conn.iter().all(Option::is_some)
    }

    pub fn bound_seats(&self) -> Vec<Seat> {
        Seat::ALL.into_iter().filter(|&s| !self.is_vacant(s)).collect()
    }

    pub fn end_round(&mut self) {
        for state in &mut self.state {
            state.total_score += state.round_score;
            state.round_score = 0;
        }
    }

    pub fn deal(&mut self, seat: Seat, hand: Vec<Card>) {
        self.state[seat.index()].hand = hand;
    }
}
