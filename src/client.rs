//! The client session: claims a seat, interprets inbound protocol messages,
//! and either renders them to a human terminal or plays automatically.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

use crate::card::{serialize_card_sequence, Card};
use crate::logger::Logger;
use crate::protocol::{self, parse_server_message, ClientMessage, ServerMessage};
use crate::seat::Seat;

/// What seat to claim and whether to play automatically.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    pub seat: Seat,
    pub auto: bool,
}

/// Client-side view of the match, built up from inbound messages alone.
struct Session {
    seat: Seat,
    hand: Vec<Card>,
    trick_leader: Option<Seat>,
    trick_log: Vec<(u8, [Card; 4], Seat)>,
    pending: Option<(u8, Vec<Card>)>,
    finished: bool,
}

impl Session {
    fn new(seat: Seat) -> Self {
        Self { seat, hand: Vec::new(), trick_leader: None, trick_log: Vec::new(), pending: None, finished: false }
    }

    fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::Busy { .. } | ServerMessage::Wrong { .. } | ServerMessage::Score { .. } => {}
            ServerMessage::Deal { starting, hand, .. } => {
                self.hand = hand.clone();
                self.trick_leader = Some(*starting);
                self.trick_log.clear();
                self.pending = None;
            }
            ServerMessage::Trick { number, cards } => {
                self.pending = Some((*number, cards.clone()));
            }
            ServerMessage::Taken { number, cards, winner } => {
                if let Some(leader) = self.trick_leader {
                    let mine = cards[self.seat.offset_from(leader) as usize];
                    if let Some(pos) = self.hand.iter().position(|&c| c == mine) {
                        self.hand.remove(pos);
                    }
                }
                self.trick_log.push((*number, *cards, *winner));
                self.trick_leader = Some(*winner);
            }
            ServerMessage::Total { .. } => {
                self.hand.clear();
                self.finished = true;
            }
        }
    }

    /// The card to play in automatic mode for the currently pending prompt,
    /// per the fixed strategy: follow suit if possible, else lead/discard
    /// the first card in hand.
    fn auto_play(&mut self) -> Option<(u8, Card)> {
        let (number, cards) = self.pending.take()?;
        let card = match cards.first() {
            None => *self.hand.first()?,
            Some(led) => self
                .hand
                .iter()
                .copied()
                .find(|c| c.suit == led.suit)
                .or_else(|| self.hand.first().copied())?,
        };
        Some((number, card))
    }

    fn validate_play(&self, card: Card) -> bool {
        let Some((_, cards)) = &self.pending else { return false };
        if !self.hand.contains(&card) {
            return false;
        }
        match cards.first() {
            None => true,
            Some(led) => card.suit == led.suit || !self.hand.iter().any(|c| c.suit == led.suit),
        }
    }
}

/// Runs one client session over an already-connected socket to completion.
/// Returns `true` iff a well-formed `TOTAL` was received before the
/// connection ended (the exit-code contract from the external interface).
pub async fn run_client(stream: TcpStream, config: ClientConfig, log: &Logger) -> anyhow::Result<bool> {
    let local = stream.local_addr()?;
    let peer = stream.peer_addr()?;
    let (read_half, mut writer) = stream.into_split();
    let mut server_lines = BufReader::new(read_half).lines();
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut session = Session::new(config.seat);

    send(&mut writer, log, local, peer, config.auto, &ClientMessage::Iam { seat: config.seat }).await?;

    loop {
        tokio::select! {
            line = server_lines.next_line() => {
                let text = match line {
                    Ok(Some(t)) => t,
                    _ => return Ok(false),
                };

                if config.auto {
                    log.protocol_line(local, peer, &format!("{text}{}", protocol::DELIMITER));
                }

                let Ok(message) = parse_server_message(&text) else { continue };
                session.apply(&message);
                if !config.auto {
                    println!("{}", human_summary(&message, &session));
                }

                if config.auto {
                    if let Some((number, card)) = session.auto_play() {
                        let msg = ClientMessage::Trick { number, card };
                        send(&mut writer, log, local, peer, true, &msg).await?;
                    }
                }

                if session.finished {
                    return Ok(true);
                }
            }

            line = stdin_lines.next_line(), if !config.auto && stdin_open => {
                match line {
                    Ok(Some(text)) => handle_human_command(&mut session, &text, &mut writer, local, peer, log).await?,
                    _ => stdin_open = false,
                }
            }
        }
    }
}

async fn handle_human_command(
    session: &mut Session,
    text: &str,
    writer: &mut OwnedWriteHalf,
    local: SocketAddr,
    peer: SocketAddr,
    log: &Logger,
) -> anyhow::Result<()> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("cards") {
        println!("Hand: {}", serialize_card_sequence(&session.hand));
    } else if trimmed.eq_ignore_ascii_case("tricks") {
        if session.trick_log.is_empty() {
            println!("No tricks taken yet this round.");
        } else {
            for (number, cards, winner) in &session.trick_log {
                println!("  trick {number}: {} -> {winner}", serialize_card_sequence(cards));
            }
        }
    } else if let Some(rest) = trimmed.strip_prefix('!') {
        match crate::card::parse_card(rest) {
            Ok((card, "")) if session.validate_play(card) => {
                let number = session.pending.as_ref().map(|(n, _)| *n).unwrap_or(1);
                session.pending = None;
                let msg = ClientMessage::Trick { number, card };
                send(writer, log, local, peer, false, &msg).await?;
            }
            _ => println!("Wrong card."),
        }
    } else {
        println!("Unknown command.");
    }
    Ok(())
}

async fn send(
    writer: &mut OwnedWriteHalf,
    log: &Logger,
    local: SocketAddr,
    peer: SocketAddr,
    log_protocol: bool,
    message: &ClientMessage,
) -> anyhow::Result<()> {
    let text = format!("{message}{}", protocol::DELIMITER);
    writer.write_all(text.as_bytes()).await?;
    if log_protocol {
        log.protocol_line(local, peer, &text);
    }
    Ok(())
}

fn human_summary(message: &ServerMessage, session: &Session) -> String {
    match message {
        ServerMessage::Busy { seats } => {
            let letters: String = seats.iter().map(|s| s.to_string()).collect();
            format!("Seat taken; busy seats are {letters}.")
        }
        ServerMessage::Deal { round_type, starting, hand } => {
            format!("Dealt round {round_type}, starting seat {starting}. Hand: {}", serialize_card_sequence(hand))
        }
        ServerMessage::Trick { number, .. } => {
            format!("Trick {number}, available hand is {}", serialize_card_sequence(&session.hand))
        }
        ServerMessage::Taken { number, cards, winner } => {
            format!("Trick {number} taken by {winner}: {}", serialize_card_sequence(cards))
        }
        ServerMessage::Wrong { number } => format!("Wrong card for trick {number}."),
        ServerMessage::Score { points } => format_points("Round score", points),
        ServerMessage::Total { points } => format_points("Total score", points),
    }
}

fn format_points(label: &str, points: &[(Seat, u32); 4]) -> String {
    let body: Vec<String> = points.iter().map(|(s, p)| format!("{s}={p}")).collect();
    format!("{label}: {}", body.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    #[test]
    fn follows_led_suit_when_possible() {
        let mut session = Session::new(Seat::North);
        session.hand = vec![Card::new(2, Suit::Clubs), Card::new(5, Suit::Hearts)];
        session.pending = Some((1, vec![Card::new(10, Suit::Hearts)]));
        let (number, card) = session.auto_play().unwrap();
        assert_eq!(number, 1);
        assert_eq!(card, Card::new(5, Suit::Hearts));
    }

    #[test]
    fn leads_first_card_when_trick_empty() {
        let mut session = Session::new(Seat::North);
        session.hand = vec![Card::new(2, Suit::Clubs), Card::new(5, Suit::Hearts)];
        session.pending = Some((1, vec![]));
        let (_, card) = session.auto_play().unwrap();
        assert_eq!(card, Card::new(2, Suit::Clubs));
    }

    #[test]
    fn discards_first_card_when_void_in_led_suit() {
        let mut session = Session::new(Seat::North);
        session.hand = vec![Card::new(2, Suit::Clubs), Card::new(5, Suit::Diamonds)];
        session.pending = Some((1, vec![Card::new(10, Suit::Hearts)]));
        let (_, card) = session.auto_play().unwrap();
        assert_eq!(card, Card::new(2, Suit::Clubs));
    }

    #[test]
    fn taken_removes_only_this_seats_contributed_card() {
        let mut session = Session::new(Seat::South);
        session.hand = vec![Card::new(9, Suit::Clubs)];
        session.trick_leader = Some(Seat::North);
        let cards = [
            Card::new(2, Suit::Clubs),
            Card::new(3, Suit::Clubs),
            Card::new(9, Suit::Clubs),
            Card::new(4, Suit::Clubs),
        ];
        session.apply(&ServerMessage::Taken { number: 1, cards, winner: Seat::East });
        assert!(session.hand.is_empty());
        assert_eq!(session.trick_leader, Some(Seat::East));
    }

    #[test]
    fn validate_play_rejects_unheld_or_wrong_suit_cards() {
        let mut session = Session::new(Seat::North);
        session.hand = vec![Card::new(2, Suit::Clubs), Card::new(5, Suit::Diamonds)];
        session.pending = Some((1, vec![Card::new(10, Suit::Hearts)]));
        // Neither hand card follows hearts, so either is legal (void in led suit).
        assert!(session.validate_play(Card::new(2, Suit::Clubs)));
        // A card not in hand is always illegal.
        assert!(!session.validate_play(Card::new(14, Suit::Spades)));
    }
}
