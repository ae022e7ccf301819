//! Host Session Management
//!
//! One session per accepted connection:
//!
//! ```text
//! AwaitingHandshake ──Request──► Playing{1..=rounds} ──► Closed
//!         │                            │
//!         └──── any failure ───────────┴──────────────► Closed
//! ```
//!
//! Strict validation: a malformed, mistyped or unrecognized message
//! ends the session at once. Game outcomes never do. Nothing survives
//! the connection.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, instrument, warn};

use crate::core::deck::Deck;
use crate::core::rng::DeterministicRng;
use crate::game::events::{Party, RoundEvent};
use crate::game::round::{Round, RoundError, RoundOutcome, RoundPhase};
use crate::game::stats::SessionStats;
use crate::network::protocol::{ClientPayload, Request, RoundResult, ServerPayload};
use crate::network::transport::{Connection, ConnectionError};
use crate::HOST_RECV_TIMEOUT;

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Short hex prefix for log lines.
pub fn short_id(id: &SessionId) -> String {
    hex::encode(&id[..4])
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the Request.
    AwaitingHandshake,
    /// Playing the given round (1-based).
    Playing {
        /// Current round number.
        round: u32,
    },
    /// Connection released.
    Closed,
}

/// Configuration for a host session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for the handshake and for each decision.
    pub recv_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recv_timeout: HOST_RECV_TIMEOUT,
        }
    }
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Request never arrived or failed validation.
    #[error("handshake failed: {0}")]
    Handshake(#[source] ConnectionError),

    /// Transport failure or protocol violation mid-session.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Round driven out of order.
    #[error("round error: {0}")]
    Round(#[from] RoundError),
}

impl SessionError {
    /// Peer timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::Handshake(ConnectionError::Timeout(_))
                | SessionError::Connection(ConnectionError::Timeout(_))
        )
    }

    /// Peer sent something the codec rejected.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            SessionError::Handshake(e) | SessionError::Connection(e) => e.is_protocol_violation(),
            _ => false,
        }
    }
}

// =============================================================================
// DECKS
// =============================================================================

/// Source of a fresh deck for each round.
pub trait DeckFactory: Send {
    /// Deck for round `round` (1-based).
    fn deck_for_round(&mut self, round: u32) -> Deck;
}

/// Independently shuffled deck per round.
#[derive(Debug, Clone)]
pub struct ShuffledDecks {
    rng: DeterministicRng,
}

impl ShuffledDecks {
    /// Decks shuffled from `rng`.
    pub fn new(rng: DeterministicRng) -> Self {
        Self { rng }
    }

    /// Decks shuffled from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(DeterministicRng::from_entropy())
    }
}

impl DeckFactory for ShuffledDecks {
    fn deck_for_round(&mut self, _round: u32) -> Deck {
        Deck::new(self.rng.fork())
    }
}

impl<F> DeckFactory for F
where
    F: FnMut(u32) -> Deck + Send,
{
    fn deck_for_round(&mut self, round: u32) -> Deck {
        self(round)
    }
}

/// Wire form of a round event.
pub fn event_to_payload(event: &RoundEvent) -> ServerPayload {
    match event {
        RoundEvent::CardDealt { card, closes, .. } => {
            ServerPayload::with_card(RoundResult::from(*closes), *card)
        }
        RoundEvent::Resolved { outcome } => ServerPayload::outcome((*outcome).into()),
    }
}

// =============================================================================
// HOST SESSION
// =============================================================================

/// Summary of a finished session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Team name from the handshake.
    pub team_name: String,
    /// Rounds the player asked for.
    pub rounds_requested: u8,
    /// Outcome tallies from the host's side.
    pub stats: SessionStats,
}

/// Host side of one player connection.
pub struct HostSession<S, D> {
    id: SessionId,
    conn: Connection<S>,
    decks: D,
    state: SessionState,
    team_name: String,
    stats: SessionStats,
}

impl<S, D> HostSession<S, D>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: DeckFactory,
{
    /// New session over an accepted stream.
    pub fn new(stream: S, config: &SessionConfig, decks: D) -> Self {
        Self {
            id: uuid::Uuid::new_v4().into_bytes(),
            conn: Connection::new(stream, config.recv_timeout),
            decks,
            state: SessionState::AwaitingHandshake,
            team_name: String::new(),
            stats: SessionStats::new(),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Handshake, then every requested round, then close.
    ///
    /// Stops at the first transport or protocol failure. The connection
    /// is released whether this returns `Ok` or `Err`.
    #[instrument(skip(self), fields(session = %short_id(&self.id)))]
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        let result = self.play().await;

        match &result {
            Ok(summary) => info!(
                team = %summary.team_name,
                rounds = summary.stats.rounds_played,
                wins = summary.stats.wins,
                losses = summary.stats.losses,
                ties = summary.stats.ties,
                "session finished"
            ),
            Err(e) => warn!(
                team = %self.team_name,
                state = ?self.state,
                rounds = self.stats.rounds_played,
                timeout = e.is_timeout(),
                error = %e,
                "session terminated"
            ),
        }

        self.conn.close().await;
        self.state = SessionState::Closed;
        debug!(state = ?self.state, "connection released");
        result
    }

    async fn play(&mut self) -> Result<SessionSummary, SessionError> {
        let request = self.handshake().await?;

        for round in 1..=u32::from(request.rounds) {
            self.state = SessionState::Playing { round };
            let outcome = self.play_round(round).await?;

            let bust = outcome.player_bust || outcome.dealer_bust;
            self.stats.record_round(outcome.outcome, bust);
        }

        Ok(SessionSummary {
            id: self.id,
            team_name: self.team_name.clone(),
            rounds_requested: request.rounds,
            stats: self.stats,
        })
    }

    async fn handshake(&mut self) -> Result<Request, SessionError> {
        let request: Request = self.conn.recv().await.map_err(SessionError::Handshake)?;

        info!(team = %request.team_name, rounds = request.rounds, "game started");
        self.team_name = request.team_name.clone();
        Ok(request)
    }

    async fn play_round(&mut self, number: u32) -> Result<RoundOutcome, SessionError> {
        let mut round = Round::new(self.decks.deck_for_round(number));
        debug!(round = number, state = ?self.state, "dealing");

        let events = round.deal()?;
        self.send_events(&events).await?;

        while round.phase() == RoundPhase::PlayerTurn {
            let payload: ClientPayload = self.conn.recv().await?;
            self.stats.record_decision(payload.decision);
            debug!(round = number, decision = %payload.decision, player = %round.player(), "decision");

            let events = round.apply(payload.decision)?;
            self.send_events(&events).await?;
        }

        // The loop only exits once the round has resolved
        let outcome = round.outcome().ok_or(RoundError::NotPlayerTurn(round.phase()))?;
        info!(
            round = number,
            outcome = ?outcome.outcome,
            player = outcome.player_score,
            dealer = outcome.dealer_score,
            "round finished"
        );
        Ok(outcome)
    }

    async fn send_events(&mut self, events: &[RoundEvent]) -> Result<(), SessionError> {
        for event in events {
            if let RoundEvent::CardDealt { party: Party::Dealer, card, .. } = event {
                debug!(%card, "dealer shows");
            }
            self.conn.send(&event_to_payload(event)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::card::{Card, Suit, ACE, KING};
    use crate::game::round::Decision;
    use crate::network::protocol::{ProtocolError, WireMessage};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn c(rank: u8, suit: Suit) -> Card {
        Card::new(rank, suit).unwrap()
    }

    fn config() -> SessionConfig {
        SessionConfig {
            recv_timeout: Duration::from_secs(2),
        }
    }

    /// Same stacked deck every round.
    fn stacked(top: Vec<Card>) -> impl FnMut(u32) -> Deck + Send {
        move |round| Deck::stacked(&top, DeterministicRng::new(round as u64))
    }

    async fn send_request(peer: &mut DuplexStream, rounds: u8) {
        let request = Request {
            rounds,
            team_name: "TheHighRollers".into(),
        };
        peer.write_all(&request.encode()).await.unwrap();
    }

    async fn send_decision(peer: &mut DuplexStream, decision: Decision) {
        peer.write_all(&ClientPayload { decision }.encode()).await.unwrap();
    }

    async fn read_payload(peer: &mut DuplexStream) -> ServerPayload {
        let mut buf = [0u8; ServerPayload::SIZE];
        peer.read_exact(&mut buf).await.unwrap();
        ServerPayload::decode(&buf).unwrap()
    }

    /// Everything the host writes until it closes the stream.
    async fn read_rest(peer: &mut DuplexStream) -> Vec<u8> {
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        rest
    }

    #[tokio::test]
    async fn test_natural_stand_wins() {
        let (host_end, mut peer) = duplex(1024);
        let deck = stacked(vec![
            c(ACE, Suit::Spades),
            c(KING, Suit::Hearts),
            c(10, Suit::Clubs),
            c(7, Suit::Diamonds),
        ]);
        let session = tokio::spawn(HostSession::new(host_end, &config(), deck).run());

        send_request(&mut peer, 1).await;
        let dealt: Vec<ServerPayload> = vec![
            read_payload(&mut peer).await,
            read_payload(&mut peer).await,
            read_payload(&mut peer).await,
        ];
        assert!(dealt.iter().all(|p| p.result == RoundResult::Continue));
        assert_eq!(dealt[0].card(), Some(c(ACE, Suit::Spades)));
        assert_eq!(dealt[1].card(), Some(c(KING, Suit::Hearts)));
        assert_eq!(dealt[2].card(), Some(c(10, Suit::Clubs)));

        send_decision(&mut peer, Decision::Stand).await;
        let hidden = read_payload(&mut peer).await;
        assert_eq!(hidden, ServerPayload::with_card(RoundResult::Continue, c(7, Suit::Diamonds)));

        let result = read_payload(&mut peer).await;
        assert_eq!(result, ServerPayload::outcome(RoundResult::Win));
        assert!(read_rest(&mut peer).await.is_empty());

        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.team_name, "TheHighRollers");
        assert_eq!(summary.stats.wins, 1);
        assert_eq!(summary.stats.stands, 1);
    }

    #[tokio::test]
    async fn test_player_bust_is_last_message() {
        let (host_end, mut peer) = duplex(1024);
        let deck = stacked(vec![
            c(10, Suit::Spades),
            c(8, Suit::Hearts),
            c(9, Suit::Clubs),
            c(7, Suit::Clubs),
            c(5, Suit::Diamonds),
        ]);
        let session = tokio::spawn(HostSession::new(host_end, &config(), deck).run());

        send_request(&mut peer, 1).await;
        for _ in 0..3 {
            read_payload(&mut peer).await;
        }

        send_decision(&mut peer, Decision::Hit).await;
        let bust = read_payload(&mut peer).await;
        assert_eq!(bust.result, RoundResult::Loss);
        assert_eq!(bust.card(), Some(c(5, Suit::Diamonds)));

        // Round and session over: nothing else arrives
        assert!(read_rest(&mut peer).await.is_empty());

        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.stats.losses, 1);
        assert_eq!(summary.stats.player_busts, 1);
    }

    #[tokio::test]
    async fn test_dealer_bust_stops_drawing() {
        let (host_end, mut peer) = duplex(1024);
        let deck = stacked(vec![
            c(10, Suit::Spades),
            c(9, Suit::Hearts),
            c(7, Suit::Clubs),
            c(6, Suit::Diamonds),
            c(9, Suit::Spades),
        ]);
        let session = tokio::spawn(HostSession::new(host_end, &config(), deck).run());

        send_request(&mut peer, 1).await;
        for _ in 0..3 {
            read_payload(&mut peer).await;
        }

        send_decision(&mut peer, Decision::Stand).await;
        let hidden = read_payload(&mut peer).await;
        assert_eq!(hidden.card(), Some(c(6, Suit::Diamonds)));
        let nine = read_payload(&mut peer).await;
        assert_eq!(nine, ServerPayload::with_card(RoundResult::Win, c(9, Suit::Spades)));
        assert!(read_rest(&mut peer).await.is_empty());

        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.stats.dealer_busts, 1);
    }

    #[tokio::test]
    async fn test_multiple_rounds() {
        let (host_end, mut peer) = duplex(4096);
        let deck = stacked(vec![
            c(10, Suit::Spades),
            c(8, Suit::Hearts),
            c(10, Suit::Clubs),
            c(8, Suit::Diamonds),
        ]);
        let session = tokio::spawn(HostSession::new(host_end, &config(), deck).run());

        send_request(&mut peer, 3).await;
        for _ in 0..3 {
            for _ in 0..3 {
                read_payload(&mut peer).await;
            }
            send_decision(&mut peer, Decision::Stand).await;
            read_payload(&mut peer).await;
            assert_eq!(read_payload(&mut peer).await, ServerPayload::outcome(RoundResult::Tie));
        }
        assert!(read_rest(&mut peer).await.is_empty());

        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.rounds_requested, 3);
        assert_eq!(summary.stats.rounds_played, 3);
        assert_eq!(summary.stats.ties, 3);
    }

    #[tokio::test]
    async fn test_zero_rounds() {
        let (host_end, mut peer) = duplex(1024);
        let session = tokio::spawn(HostSession::new(host_end, &config(), ShuffledDecks::from_entropy()).run());

        send_request(&mut peer, 0).await;
        assert!(read_rest(&mut peer).await.is_empty());

        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.stats.rounds_played, 0);
    }

    #[tokio::test]
    async fn test_bad_handshake_closes() {
        let (host_end, mut peer) = duplex(1024);
        let session = tokio::spawn(HostSession::new(host_end, &config(), ShuffledDecks::from_entropy()).run());

        let mut request = Request {
            rounds: 1,
            team_name: "x".into(),
        }
        .encode()
        .to_vec();
        request[1] = 0xFF;
        peer.write_all(&request).await.unwrap();

        assert!(read_rest(&mut peer).await.is_empty());
        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Handshake(ConnectionError::Protocol(ProtocolError::BadMagic(_)))
        ));
        assert!(err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_handshake_disconnect() {
        let (host_end, mut peer) = duplex(1024);
        let session = tokio::spawn(HostSession::new(host_end, &config(), ShuffledDecks::from_entropy()).run());

        peer.write_all(&crate::MAGIC_COOKIE.to_be_bytes()).await.unwrap();
        drop(peer);

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Handshake(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (host_end, peer) = duplex(1024);
        let config = SessionConfig {
            recv_timeout: Duration::from_millis(50),
        };
        let session = tokio::spawn(HostSession::new(host_end, &config, ShuffledDecks::from_entropy()).run());

        // Peer stays connected but never sends the Request
        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Handshake(ConnectionError::Timeout(d)) if d == Duration::from_millis(50)
        ));
        assert!(err.is_timeout());
        assert!(!err.is_protocol_violation());
        drop(peer);
    }

    #[tokio::test]
    async fn test_invalid_decision_terminates() {
        let (host_end, mut peer) = duplex(1024);
        let session = tokio::spawn(HostSession::new(host_end, &config(), ShuffledDecks::from_entropy()).run());

        send_request(&mut peer, 5).await;
        for _ in 0..3 {
            read_payload(&mut peer).await;
        }

        let mut bad = crate::MAGIC_COOKIE.to_be_bytes().to_vec();
        bad.push(0x4);
        bad.extend_from_slice(b"Hit\0\0");
        peer.write_all(&bad).await.unwrap();

        // No retry, no further cards: the host hangs up
        assert!(read_rest(&mut peer).await.is_empty());
        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Connection(ConnectionError::Protocol(ProtocolError::InvalidDecision(_)))
        ));
    }

    #[tokio::test]
    async fn test_decision_timeout() {
        let (host_end, mut peer) = duplex(1024);
        let config = SessionConfig {
            recv_timeout: Duration::from_millis(50),
        };
        let session = tokio::spawn(HostSession::new(host_end, &config, ShuffledDecks::from_entropy()).run());

        send_request(&mut peer, 1).await;
        for _ in 0..3 {
            read_payload(&mut peer).await;
        }

        let err = session.await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(read_rest(&mut peer).await.is_empty());
    }

    #[test]
    fn test_event_to_payload() {
        let card = c(4, Suit::Clubs);
        let dealt = RoundEvent::CardDealt {
            party: Party::Player,
            card,
            closes: None,
        };
        assert_eq!(event_to_payload(&dealt), ServerPayload::with_card(RoundResult::Continue, card));

        let resolved = RoundEvent::Resolved {
            outcome: crate::game::events::Outcome::Tie,
        };
        let payload = event_to_payload(&resolved);
        assert_eq!((payload.result, payload.rank, payload.suit), (RoundResult::Tie, 0, 0));
    }

    #[test]
    fn test_shuffled_decks_differ_per_round() {
        let mut decks = ShuffledDecks::new(DeterministicRng::new(3));
        let mut a = decks.deck_for_round(1);
        let mut b = decks.deck_for_round(2);
        let first_a: Vec<Card> = (0..10).map(|_| a.draw()).collect();
        let first_b: Vec<Card> = (0..10).map(|_| b.draw()).collect();
        assert_ne!(first_a, first_b);
    }
}
