//! In-process integration tests: real loopback TCP sockets, driven through
//! `run_server`/`run_client` (and, where the scenario needs to inject
//! protocol traffic directly, a small raw socket harness) rather than
//! spawned subprocesses.

use std::net::SocketAddr;
use std::time::Duration;

use thief::card::{Card, Suit};
use thief::client::{run_client, ClientConfig};
use thief::deal::{DealFile, Round};
use thief::logger::Logger;
use thief::protocol::{parse_server_message, ServerMessage};
use thief::seat::Seat;
use thief::server::run_server;
use thief::timing::NoPlayTimeout;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

fn suit_hand(suit: Suit) -> Vec<Card> {
    (2..=14).map(|r| Card::new(r, suit)).collect()
}

fn monosuit_round(round_type: u8, starting: Seat) -> Round {
    Round {
        round_type,
        starting,
        hands: [suit_hand(Suit::Clubs), suit_hand(Suit::Diamonds), suit_hand(Suit::Hearts), suit_hand(Suit::Spades)],
    }
}

/// A round where North holds mostly Hearts (plus one Club) and East holds
/// mostly Clubs (plus one Heart), so a "holds the led suit but plays
/// something else" illegal response can actually be constructed.
fn mixed_round() -> Round {
    let mut north: Vec<Card> = (2..=13).map(|r| Card::new(r, Suit::Hearts)).collect();
    north.push(Card::new(2, Suit::Clubs));
    let mut east: Vec<Card> = (3..=14).map(|r| Card::new(r, Suit::Clubs)).collect();
    east.push(Card::new(14, Suit::Hearts));
    Round {
        round_type: 1,
        starting: Seat::North,
        hands: [north, east, suit_hand(Suit::Diamonds), suit_hand(Suit::Spades)],
    }
}

async fn bound_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn spawn_server(listener: TcpListener, deal: DealFile, timeout: NoPlayTimeout) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let log = Logger::new(0);
        run_server(listener, deal, timeout, &log).await.unwrap();
    })
}

/// Drives the raw wire protocol directly, for scenarios that need to inject
/// traffic `run_client`'s fixed strategies would never produce.
struct RawClient {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl RawClient {
    async fn connect(addr: SocketAddr, seat: Seat) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut writer) = stream.into_split();
        writer.write_all(format!("IAM{seat}\r\n").as_bytes()).await.unwrap();
        Self { reader: BufReader::new(read_half).lines(), writer }
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        let line = self.reader.next_line().await.unwrap().expect("connection closed unexpectedly");
        parse_server_message(&line).unwrap_or_else(|e| panic!("malformed server message {line:?}: {e}"))
    }
}

#[tokio::test]
async fn happy_round_of_one_sums_to_thirteen() {
    let (listener, addr) = bound_listener().await;
    let deal = DealFile { rounds: vec![monosuit_round(1, Seat::North)] };
    let server = spawn_server(listener, deal, NoPlayTimeout::default());

    let mut handles = Vec::new();
    for seat in Seat::ALL {
        handles.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let log = Logger::new(0);
            run_client(stream, ClientConfig { seat, auto: true }, &log).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap(), "every automatic client should see a well-formed TOTAL");
    }

    server.await.unwrap();
}

#[tokio::test]
async fn illegal_play_is_rejected_without_ending_the_trick() {
    let (listener, addr) = bound_listener().await;
    let deal = DealFile { rounds: vec![mixed_round()] };
    let _server = spawn_server(listener, deal, NoPlayTimeout::default());

    let mut n = RawClient::connect(addr, Seat::North).await;
    let mut e = RawClient::connect(addr, Seat::East).await;
    let mut s = RawClient::connect(addr, Seat::South).await;
    let mut w = RawClient::connect(addr, Seat::West).await;

    for client in [&mut n, &mut e, &mut s, &mut w] {
        assert!(matches!(client.recv().await, ServerMessage::Deal { .. }));
    }
    assert!(matches!(n.recv().await, ServerMessage::Trick { number: 1, .. }));

    n.send_raw("TRICK12H").await;
    assert!(matches!(e.recv().await, ServerMessage::Trick { number: 1, .. }));

    // East holds the Ace of Hearts but answers with a Club instead.
    e.send_raw("TRICK13C").await;
    assert!(matches!(e.recv().await, ServerMessage::Wrong { number: 1 }));

    // The correct follow-suit response is still accepted afterwards, proving
    // the illegal attempt neither advanced the trick nor consumed the card.
    e.send_raw("TRICK1AH").await;
    assert!(matches!(s.recv().await, ServerMessage::Trick { number: 1, .. }));
}

#[tokio::test]
async fn busy_seat_gets_a_busy_reply() {
    let (listener, addr) = bound_listener().await;
    let deal = DealFile { rounds: vec![monosuit_round(1, Seat::North)] };
    let _server = spawn_server(listener, deal, NoPlayTimeout::default());

    let mut n = RawClient::connect(addr, Seat::North).await;
    let _e = RawClient::connect(addr, Seat::East).await;
    let _s = RawClient::connect(addr, Seat::South).await;
    let _w = RawClient::connect(addr, Seat::West).await;
    assert!(matches!(n.recv().await, ServerMessage::Deal { .. }));

    let mut intruder = RawClient::connect(addr, Seat::North).await;
    match intruder.recv().await {
        ServerMessage::Busy { seats } => assert!(seats.contains(&Seat::North)),
        other => panic!("expected BUSY, got {other:?}"),
    }
}

#[tokio::test]
async fn reconnecting_seat_replays_deal_and_taken_log() {
    let (listener, addr) = bound_listener().await;
    let deal = DealFile { rounds: vec![monosuit_round(1, Seat::North)] };
    let _server = spawn_server(listener, deal, NoPlayTimeout::default());

    let mut n = RawClient::connect(addr, Seat::North).await;
    let mut e = RawClient::connect(addr, Seat::East).await;
    let mut s = RawClient::connect(addr, Seat::South).await;
    let mut w = RawClient::connect(addr, Seat::West).await;

    for client in [&mut n, &mut e, &mut s, &mut w] {
        assert!(matches!(client.recv().await, ServerMessage::Deal { .. }));
    }
    assert!(matches!(n.recv().await, ServerMessage::Trick { number: 1, .. }));

    // Every seat is void in every suit but its own, so each play below is
    // legal regardless of rank; North's Club is the only led-suit card so
    // North wins the trick outright.
    n.send_raw("TRICK114C").await;
    assert!(matches!(e.recv().await, ServerMessage::Trick { number: 1, .. }));
    e.send_raw("TRICK114D").await;
    assert!(matches!(s.recv().await, ServerMessage::Trick { number: 1, .. }));
    s.send_raw("TRICK114H").await;
    assert!(matches!(w.recv().await, ServerMessage::Trick { number: 1, .. }));
    w.send_raw("TRICK114S").await;

    for client in [&mut n, &mut e, &mut s, &mut w] {
        assert!(matches!(client.recv().await, ServerMessage::Taken { number: 1, winner: Seat::North, .. }));
    }
    assert!(matches!(n.recv().await, ServerMessage::Trick { number: 2, .. }));

    drop(e);
    // Give the server's event loop a chance to observe the closed socket and
    // vacate the seat before the replacement connection claims it.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut new_e = RawClient::connect(addr, Seat::East).await;
    assert!(matches!(new_e.recv().await, ServerMessage::Deal { .. }));
    assert!(matches!(new_e.recv().await, ServerMessage::Taken { number: 1, winner: Seat::North, .. }));
}

#[tokio::test]
async fn silent_actor_gets_re_prompted_on_timeout() {
    let (listener, addr) = bound_listener().await;
    let deal = DealFile { rounds: vec![monosuit_round(1, Seat::North)] };
    let timeout = NoPlayTimeout(Duration::from_millis(300));
    let _server = spawn_server(listener, deal, timeout);

    let mut n = RawClient::connect(addr, Seat::North).await;
    let _e = RawClient::connect(addr, Seat::East).await;
    let _s = RawClient::connect(addr, Seat::South).await;
    let _w = RawClient::connect(addr, Seat::West).await;

    assert!(matches!(n.recv().await, ServerMessage::Deal { .. }));
    let first = n.recv().await;
    assert!(matches!(first, ServerMessage::Trick { number: 1, ref cards } if cards.is_empty()));
    // North stays silent; the same prompt should be re-issued once the
    // timeout elapses, with no other state change.
    let second = n.recv().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn two_round_match_completes_and_stops_accepting() {
    let (listener, addr) = bound_listener().await;
    let deal = DealFile { rounds: vec![monosuit_round(1, Seat::North), monosuit_round(1, Seat::East)] };
    let server = spawn_server(listener, deal, NoPlayTimeout::default());

    let mut handles = Vec::new();
    for seat in Seat::ALL {
        handles.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let log = Logger::new(0);
            run_client(stream, ClientConfig { seat, auto: true }, &log).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    server.await.unwrap();
    assert!(TcpStream::connect(addr).await.is_err(), "listener should have stopped accepting after the last round");
}

#[tokio::test]
async fn connection_silent_about_iam_is_dropped_after_the_timeout() {
    let (listener, addr) = bound_listener().await;
    let deal = DealFile { rounds: vec![monosuit_round(1, Seat::North)] };
    let _server = spawn_server(listener, deal, NoPlayTimeout(Duration::from_millis(300)));

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut lines = BufReader::new(stream).lines();
    let closed = tokio::time::timeout(Duration::from_secs(2), lines.next_line()).await;
    assert!(matches!(closed, Ok(Ok(None))), "server should close a connection that never sends IAM in time");
}
