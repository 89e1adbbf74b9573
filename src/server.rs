//! The connection multiplexer: a single cooperative task that accepts the
//! four seats, drains their lines through a `tokio_stream::StreamMap`, and
//! dispatches them into the match [`Engine`].

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_stream::{Stream, StreamExt, StreamMap};

use crate::deal::DealFile;
use crate::engine::{Engine, Outbound};
use crate::logger::Logger;
use crate::protocol::{self, parse_client_message, ClientMessage, ServerMessage};
use crate::seat::Seat;
use crate::timing::NoPlayTimeout;

pub type ConnId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    Draining,
    Closed,
}

struct Connection {
    writer: OwnedWriteHalf,
    local: SocketAddr,
    peer: SocketAddr,
    lifecycle: Lifecycle,
}

/// Wraps `tokio::io::Lines` so end-of-stream surfaces as one terminal `Err`
/// instead of silently vanishing from the `StreamMap` — the multiplexer
/// treats that the same as any other line-read error (peer disconnect).
struct ConnLines {
    inner: Lines<BufReader<OwnedReadHalf>>,
    done: bool,
}

impl ConnLines {
    fn new(read_half: OwnedReadHalf) -> Self {
        Self { inner: BufReader::new(read_half).lines(), done: false }
    }
}

impl Stream for ConnLines {
    type Item = io::Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.inner.poll_next_line(cx) {
            Poll::Ready(Ok(Some(line))) => Poll::Ready(Some(Ok(line))),
            Poll::Ready(Ok(None)) => {
                this.done = true;
                Poll::Ready(Some(Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"))))
            }
            Poll::Ready(Err(e)) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Runs the server's single cooperative event loop to completion (i.e. until
/// the match is over and every bound connection has drained).
pub async fn run_server(
    listener: TcpListener,
    deal: DealFile,
    timeout: NoPlayTimeout,
    log: &Logger,
) -> anyhow::Result<()> {
    let mut engine: Engine<ConnId> = Engine::new(deal, timeout);
    let mut connections: HashMap<ConnId, Connection> = HashMap::new();
    let mut lines: StreamMap<ConnId, ConnLines> = StreamMap::new();
    let mut next_id: ConnId = 0;
    let mut accepting = true;
    // Connections that haven't yet claimed a seat, each with the instant by
    // which a well-formed IAM must arrive or the connection is dropped.
    let mut claim_deadlines: HashMap<ConnId, Instant> = HashMap::new();

    loop {
        if !accepting && connections.is_empty() {
            break;
        }

        let earliest_claim = claim_deadlines.values().min().copied();
        let wake_at = match earliest_claim {
            Some(claim) => std::cmp::min(engine.deadline_instant(), claim),
            None => engine.deadline_instant(),
        };

        tokio::select! {
            accepted = listener.accept(), if accepting => {
                match accepted {
                    Ok((stream, peer)) => {
                        let local = stream.local_addr().unwrap_or(peer);
                        let (read_half, write_half) = stream.into_split();
                        let id = next_id;
                        next_id += 1;
                        connections.insert(id, Connection { writer: write_half, local, peer, lifecycle: Lifecycle::Open });
                        lines.insert(id, ConnLines::new(read_half));
                        claim_deadlines.insert(id, Instant::now() + timeout.0);
                        log.verbose(format!("accepted connection {id} from {peer}"));
                    }
                    Err(e) => log.warn(format!("accept error: {e}")),
                }
            }

            Some((id, line)) = lines.next() => {
                match line {
                    Ok(text) => {
                        handle_line(&mut engine, &mut connections, &mut lines, &mut accepting, log, id, text).await;
                        if !connections.contains_key(&id) || engine.seats().seat_of(id).is_some() {
                            claim_deadlines.remove(&id);
                        }
                    }
                    Err(_) => {
                        disconnect(&mut engine, &mut connections, &mut lines, id);
                        claim_deadlines.remove(&id);
                    }
                }
            }

            _ = tokio::time::sleep_until(wake_at) => {
                let outbound = engine.maybe_prompt();
                dispatch(&engine, &mut connections, &mut accepting, log, outbound).await;

                let now = Instant::now();
                let expired: Vec<ConnId> = claim_deadlines.iter().filter(|(_, &d)| d <= now).map(|(&id, _)| id).collect();
                for id in expired {
                    log.verbose(format!("connection {id} never claimed a seat in time"));
                    disconnect(&mut engine, &mut connections, &mut lines, id);
                    claim_deadlines.remove(&id);
                }
            }
        }

        reap(&mut connections, &mut lines);
    }

    Ok(())
}

async fn handle_line(
    engine: &mut Engine<ConnId>,
    connections: &mut HashMap<ConnId, Connection>,
    lines: &mut StreamMap<ConnId, ConnLines>,
    accepting: &mut bool,
    log: &Logger,
    id: ConnId,
    text: String,
) {
    if let Some(conn) = connections.get(&id) {
        log.protocol_line(conn.local, conn.peer, &format!("{text}{}", protocol::DELIMITER));
    }

    let bound_seat = engine.seats().seat_of(id);
    let message = match parse_client_message(&text) {
        Ok(m) => m,
        Err(_) => {
            if let Some(seat) = bound_seat {
                engine.vacate(seat);
            }
            disconnect(engine, connections, lines, id);
            return;
        }
    };

    match (bound_seat, message) {
        (None, ClientMessage::Iam { seat }) => {
            let outbound = engine.claim_seat(id, seat);
            dispatch(engine, connections, accepting, log, outbound).await;
            if engine.seats().seat_of(id).is_none() {
                if let Some(conn) = connections.get_mut(&id) {
                    conn.lifecycle = Lifecycle::Draining;
                }
            } else {
                let prompt = engine.maybe_prompt();
                dispatch(engine, connections, accepting, log, prompt).await;
            }
        }
        (Some(seat), ClientMessage::Trick { number: _, card }) => {
            let (_outcome, outbound) = engine.play(seat, card);
            dispatch(engine, connections, accepting, log, outbound).await;
            let prompt = engine.maybe_prompt();
            dispatch(engine, connections, accepting, log, prompt).await;
        }
        // Any other message out of sequence (TRICK before claiming a seat,
        // or a repeat IAM once bound) is treated as malformed for this
        // connection's current state.
        (None, ClientMessage::Trick { .. }) | (Some(_), ClientMessage::Iam { .. }) => {
            if let Some(seat) = bound_seat {
                engine.vacate(seat);
            }
            disconnect(engine, connections, lines, id);
        }
    }
}

fn disconnect(
    engine: &mut Engine<ConnId>,
    connections: &mut HashMap<ConnId, Connection>,
    lines: &mut StreamMap<ConnId, ConnLines>,
    id: ConnId,
) {
    if let Some(seat) = engine.seats().seat_of(id) {
        engine.vacate(seat);
    }
    connections.remove(&id);
    lines.remove(&id);
}

async fn dispatch(
    engine: &Engine<ConnId>,
    connections: &mut HashMap<ConnId, Connection>,
    accepting: &mut bool,
    log: &Logger,
    outbound: Vec<Outbound<ConnId>>,
) {
    for item in outbound {
        match item {
            Outbound::To(seat, message) => {
                if let Some(id) = engine.seats().conn_of(seat) {
                    send(connections, log, id, &message).await;
                }
            }
            Outbound::ToConn(id, message) => {
                send(connections, log, id, &message).await;
            }
            Outbound::Broadcast(message) => {
                for seat in Seat::ALL {
                    if let Some(id) = engine.seats().conn_of(seat) {
                        send(connections, log, id, &message).await;
                    }
                }
            }
            Outbound::MatchOver => {
                for conn in connections.values_mut() {
                    conn.lifecycle = Lifecycle::Draining;
                }
                *accepting = false;
            }
        }
    }
}

async fn send(connections: &mut HashMap<ConnId, Connection>, log: &Logger, id: ConnId, message: &ServerMessage) {
    let Some(conn) = connections.get_mut(&id) else { return };
    if conn.lifecycle == Lifecycle::Closed {
        return;
    }
    let text = format!("{message}{}", protocol::DELIMITER);
    if conn.writer.write_all(text.as_bytes()).await.is_err() {
        conn.lifecycle = Lifecycle::Closed;
        return;
    }
    log.protocol_line(conn.local, conn.peer, &text);
}

/// Removes every connection whose outbound work is done — writes are
/// awaited inline above, so a `Draining`/`Closed` connection has already
/// flushed by the time this runs.
fn reap(connections: &mut HashMap<ConnId, Connection>, lines: &mut StreamMap<ConnId, ConnLines>) {
    let done: Vec<ConnId> = connections
        .iter()
        .filter(|(_, c)| matches!(c.lifecycle, Lifecycle::Draining | Lifecycle::Closed))
        .map(|(id, _)| *id)
        .collect();
    for id in done {
        connections.remove(&id);
        lines.remove(&id);
    }
}
