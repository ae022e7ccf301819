//! Player Session
//!
//! Client side of one table connection. Reads the host's payloads in
//! wire order, forwards them to a [`Presenter`], and answers each
//! decision point with the presenter's choice. Stands automatically on
//! exactly 21.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::card::Card;
use crate::core::hand::Hand;
use crate::game::advice::advise;
use crate::game::events::{Outcome, Party};
use crate::game::round::Decision;
use crate::game::stats::SessionStats;
use crate::network::protocol::{ClientPayload, Request, RoundResult, ServerPayload};
use crate::network::transport::{Connection, ConnectionError};
use crate::presenter::{CardOwner, Presenter};
use crate::{BLACKJACK, DISCOVERY_PORT};

/// Player configuration.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Name sent in the handshake.
    pub team_name: String,
    /// UDP port to listen for offers on.
    pub discovery_port: u16,
    /// Deadline for the TCP connect.
    pub connect_timeout: Duration,
    /// Deadline for each host payload.
    pub recv_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            team_name: "TheHighRollers".to_string(),
            discovery_port: DISCOVERY_PORT,
            connect_timeout: Duration::from_secs(5),
            recv_timeout: Duration::from_secs(30),
        }
    }
}

impl PlayerConfig {
    /// Defaults overridden by `BLACKJACK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `var` returns for each key.
    /// Unparsable values keep the default.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            team_name: var("BLACKJACK_TEAM_NAME").unwrap_or(defaults.team_name),
            discovery_port: var("BLACKJACK_DISCOVERY_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.discovery_port),
            ..defaults
        }
    }
}

/// Player session errors.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Transport failure or a frame the codec rejected.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Well-formed payload that does not fit the round so far.
    #[error("unexpected payload {result:?} during {during}")]
    UnexpectedPayload {
        /// Result code received.
        result: RoundResult,
        /// What the player was waiting for.
        during: &'static str,
    },
}

impl PlayerError {
    /// The host broke the protocol, either in framing or in sequence.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            PlayerError::Connection(e) => e.is_protocol_violation(),
            PlayerError::UnexpectedPayload { .. } => true,
        }
    }
}

/// Await `io` for at most `deadline`.
async fn with_deadline<T>(
    deadline: Duration,
    io: impl Future<Output = io::Result<T>>,
) -> Result<T, ConnectionError> {
    match timeout(deadline, io).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ConnectionError::Timeout(deadline)),
    }
}

/// One step of the host's card stream.
enum Step {
    /// Card dealt, round continues.
    Card(Card),
    /// Round closed, possibly by the attached card.
    Closed {
        outcome: Outcome,
        card: Option<Card>,
    },
}

/// Client side of a table session.
pub struct PlayerSession<S, P> {
    conn: Connection<S>,
    presenter: P,
    team_name: String,
    stats: SessionStats,
}

impl<P: Presenter> PlayerSession<TcpStream, P> {
    /// Connect to a host within the configured deadline.
    pub async fn connect(
        addr: SocketAddr,
        config: &PlayerConfig,
        presenter: P,
    ) -> Result<Self, ConnectionError> {
        let stream = with_deadline(config.connect_timeout, TcpStream::connect(addr)).await?;
        stream.set_nodelay(true)?;

        info!(%addr, "connected to table");
        Ok(Self::new(stream, config, presenter))
    }
}

impl<S, P> PlayerSession<S, P>
where
    S: AsyncRead + AsyncWrite + Unpin,
    P: Presenter,
{
    /// Session over an established stream.
    pub fn new(stream: S, config: &PlayerConfig, presenter: P) -> Self {
        Self {
            conn: Connection::new(stream, config.recv_timeout),
            presenter,
            team_name: config.team_name.clone(),
            stats: SessionStats::new(),
        }
    }

    /// Ask for rounds, play them all, close.
    ///
    /// Fatal errors are reported through [`Presenter::on_error`] before
    /// being returned. The presenter is handed back either way.
    pub async fn run(mut self) -> (P, Result<SessionStats, PlayerError>) {
        let result = self.play().await;

        match &result {
            Ok(stats) => {
                info!(rounds = stats.rounds_played, wins = stats.wins, "session finished");
                self.presenter.on_session_end();
            }
            Err(e) => {
                warn!(error = %e, protocol = e.is_protocol_violation(), "session failed");
                self.presenter.on_error(&e.to_string());
            }
        }

        self.conn.close().await;
        (self.presenter, result)
    }

    async fn play(&mut self) -> Result<SessionStats, PlayerError> {
        let rounds = self.presenter.requested_round_count();
        let request = Request {
            rounds,
            team_name: self.team_name.clone(),
        };
        self.conn.send(&request).await?;
        debug!(rounds, team = %self.team_name, "request sent");

        for round in 1..=u32::from(rounds) {
            self.presenter.on_round_start(round);
            self.play_round().await?;
        }
        Ok(self.stats)
    }

    async fn play_round(&mut self) -> Result<(), PlayerError> {
        let mut hand = Hand::new();

        for _ in 0..2 {
            let card = self.initial_card(Party::Player).await?;
            hand.push(card);
        }
        let dealer_up = self.initial_card(Party::Dealer).await?;

        loop {
            let decision = if hand.score() == BLACKJACK {
                Decision::Stand
            } else {
                self.presenter.on_advice_available(advise(hand.score(), dealer_up));
                self.presenter.player_decision()
            };

            self.conn.send(&ClientPayload { decision }).await?;
            self.stats.record_decision(decision);
            debug!(%decision, hand = %hand, "decision sent");

            if decision == Decision::Stand {
                break;
            }

            match self.next_step(Party::Player).await? {
                Step::Card(card) => hand.push(card),
                Step::Closed { outcome, card } => {
                    self.finish_round(outcome, card.is_some());
                    return Ok(());
                }
            }
        }

        loop {
            if let Step::Closed { outcome, card } = self.next_step(Party::Dealer).await? {
                self.finish_round(outcome, card.is_some());
                return Ok(());
            }
        }
    }

    async fn initial_card(&mut self, party: Party) -> Result<Card, PlayerError> {
        let payload: ServerPayload = self.conn.recv().await?;
        match (payload.result, payload.card()) {
            (RoundResult::Continue, Some(card)) => {
                self.presenter.on_card_dealt(card, party.into());
                Ok(card)
            }
            (result, _) => Err(PlayerError::UnexpectedPayload {
                result,
                during: "initial deal",
            }),
        }
    }

    async fn next_step(&mut self, party: Party) -> Result<Step, PlayerError> {
        let payload: ServerPayload = self.conn.recv().await?;
        let card = payload.card();
        if let Some(card) = card {
            self.presenter.on_card_dealt(card, CardOwner::from(party));
        }

        match (payload.result.outcome(), card) {
            (Some(outcome), card) => Ok(Step::Closed { outcome, card }),
            (None, Some(card)) => Ok(Step::Card(card)),
            (None, None) => Err(PlayerError::UnexpectedPayload {
                result: payload.result,
                during: "turn",
            }),
        }
    }

    /// A terminal payload carrying a card means someone went bust.
    fn finish_round(&mut self, outcome: Outcome, closed_by_card: bool) {
        self.stats.record_round(outcome, closed_by_card);
        info!(?outcome, bust = closed_by_card, "round over");
        self.presenter.on_round_result(outcome);
        self.presenter.on_session_stats(&self.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::card::{Suit, ACE, KING};
    use crate::core::deck::Deck;
    use crate::core::rng::DeterministicRng;
    use crate::network::protocol::WireMessage;
    use crate::network::session::{HostSession, SessionConfig};
    use std::collections::VecDeque;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn c(rank: u8, suit: Suit) -> Card {
        Card::new(rank, suit).unwrap()
    }

    /// Presenter that replays scripted decisions and records every hook.
    #[derive(Default)]
    struct Scripted {
        rounds: u8,
        decisions: VecDeque<Decision>,
        asked: usize,
        cards: Vec<(Card, CardOwner)>,
        advice: Vec<Decision>,
        results: Vec<Outcome>,
        started: Vec<u32>,
        stats_reports: usize,
        errors: Vec<String>,
        ended: bool,
    }

    impl Scripted {
        fn new(rounds: u8, decisions: &[Decision]) -> Self {
            Self {
                rounds,
                decisions: decisions.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl Presenter for Scripted {
        fn on_offer_received(&mut self, _addr: SocketAddr, _name: &str) {}

        fn on_round_start(&mut self, round: u32) {
            self.started.push(round);
        }

        fn on_card_dealt(&mut self, card: Card, owner: CardOwner) {
            self.cards.push((card, owner));
        }

        fn on_advice_available(&mut self, suggestion: Decision) {
            self.advice.push(suggestion);
        }

        fn on_round_result(&mut self, outcome: Outcome) {
            self.results.push(outcome);
        }

        fn on_session_stats(&mut self, _stats: &SessionStats) {
            self.stats_reports += 1;
        }

        fn on_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }

        fn on_session_end(&mut self) {
            self.ended = true;
        }

        fn requested_round_count(&mut self) -> u8 {
            self.rounds
        }

        fn player_decision(&mut self) -> Decision {
            self.asked += 1;
            self.decisions.pop_front().unwrap_or(Decision::Stand)
        }
    }

    fn config() -> PlayerConfig {
        PlayerConfig {
            recv_timeout: Duration::from_secs(2),
            ..PlayerConfig::default()
        }
    }

    /// Run a player against a host dealing from `top` every round.
    async fn against_host(top: Vec<Card>, presenter: Scripted) -> (Scripted, Result<SessionStats, PlayerError>) {
        let (host_end, player_end) = duplex(4096);
        let decks = move |round: u32| Deck::stacked(&top, DeterministicRng::new(u64::from(round)));
        let host = tokio::spawn(
            HostSession::new(
                host_end,
                &SessionConfig {
                    recv_timeout: Duration::from_secs(2),
                },
                decks,
            )
            .run(),
        );

        let outcome = PlayerSession::new(player_end, &config(), presenter).run().await;
        host.await.unwrap().unwrap();
        outcome
    }

    #[tokio::test]
    async fn test_blackjack_auto_stands() {
        let top = vec![
            c(ACE, Suit::Spades),
            c(KING, Suit::Hearts),
            c(10, Suit::Clubs),
            c(7, Suit::Diamonds),
        ];
        let (presenter, result) = against_host(top, Scripted::new(1, &[Decision::Hit])).await;
        let stats = result.unwrap();

        assert_eq!(presenter.asked, 0);
        assert!(presenter.advice.is_empty());
        assert_eq!(presenter.results, vec![Outcome::Win]);
        assert_eq!((stats.wins, stats.stands, stats.hits), (1, 1, 0));
        assert!(presenter.ended);

        let owners: Vec<CardOwner> = presenter.cards.iter().map(|(_, o)| *o).collect();
        assert_eq!(
            owners,
            vec![CardOwner::Player, CardOwner::Player, CardOwner::Dealer, CardOwner::Dealer]
        );
    }

    #[tokio::test]
    async fn test_bust_ends_round() {
        let top = vec![
            c(10, Suit::Spades),
            c(8, Suit::Hearts),
            c(9, Suit::Clubs),
            c(7, Suit::Clubs),
            c(5, Suit::Diamonds),
        ];
        let (presenter, result) = against_host(top, Scripted::new(1, &[Decision::Hit])).await;
        let stats = result.unwrap();

        // 18 against a 9: stand is advised, the script hits anyway
        assert_eq!(presenter.advice, vec![Decision::Stand]);
        assert_eq!(presenter.results, vec![Outcome::Loss]);
        assert_eq!(presenter.cards.last(), Some(&(c(5, Suit::Diamonds), CardOwner::Player)));
        assert_eq!((stats.losses, stats.player_busts, stats.hits), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_dealer_bust_counts() {
        let top = vec![
            c(10, Suit::Spades),
            c(9, Suit::Hearts),
            c(7, Suit::Clubs),
            c(6, Suit::Diamonds),
            c(9, Suit::Spades),
        ];
        let (presenter, result) = against_host(top, Scripted::new(1, &[Decision::Stand])).await;
        let stats = result.unwrap();

        assert_eq!(presenter.results, vec![Outcome::Win]);
        assert_eq!(stats.dealer_busts, 1);
        assert_eq!(presenter.cards.len(), 5);
    }

    #[tokio::test]
    async fn test_several_rounds_report_stats() {
        let top = vec![
            c(10, Suit::Spades),
            c(2, Suit::Hearts),
            c(10, Suit::Clubs),
            c(8, Suit::Diamonds),
            c(5, Suit::Spades),
        ];
        // 12 -> hit 5 -> 17 -> stand; dealer 18 wins
        let script = [Decision::Hit, Decision::Stand, Decision::Hit, Decision::Stand];
        let (presenter, result) = against_host(top, Scripted::new(2, &script)).await;
        let stats = result.unwrap();

        assert_eq!(presenter.started, vec![1, 2]);
        assert_eq!(presenter.results, vec![Outcome::Loss, Outcome::Loss]);
        assert_eq!(presenter.stats_reports, 2);
        assert_eq!(stats.player_busts, 0);
        assert_eq!((stats.hits, stats.stands), (2, 2));
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_fatal() {
        let (mut host_end, player_end) = duplex(1024);
        let host = tokio::spawn(async move {
            let mut request = [0u8; Request::SIZE];
            host_end.read_exact(&mut request).await.unwrap();

            let mut bad = ServerPayload::dealt(c(3, Suit::Clubs)).encode().to_vec();
            bad[0] = 0;
            host_end.write_all(&bad).await.unwrap();
            host_end
        });

        let (presenter, result) = PlayerSession::new(player_end, &config(), Scripted::new(1, &[]))
            .run()
            .await;
        let _ = host.await.unwrap();

        let err = result.unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(presenter.errors.len(), 1);
        assert!(!presenter.ended);
    }

    #[tokio::test]
    async fn test_outcome_during_deal_rejected() {
        let (mut host_end, player_end) = duplex(1024);
        let host = tokio::spawn(async move {
            let mut request = [0u8; Request::SIZE];
            host_end.read_exact(&mut request).await.unwrap();
            host_end
                .write_all(&ServerPayload::outcome(RoundResult::Tie).encode())
                .await
                .unwrap();
            host_end
        });

        let (_, result) = PlayerSession::new(player_end, &config(), Scripted::new(1, &[]))
            .run()
            .await;
        let _ = host.await.unwrap();

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            PlayerError::UnexpectedPayload {
                result: RoundResult::Tie,
                during: "initial deal",
            }
        ));
        assert!(err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_empty_continue_during_turn_rejected() {
        let (mut host_end, player_end) = duplex(1024);
        let host = tokio::spawn(async move {
            let mut request = [0u8; Request::SIZE];
            host_end.read_exact(&mut request).await.unwrap();
            for card in [c(10, Suit::Spades), c(2, Suit::Hearts), c(9, Suit::Clubs)] {
                host_end.write_all(&ServerPayload::dealt(card).encode()).await.unwrap();
            }
            let mut decision = [0u8; ClientPayload::SIZE];
            host_end.read_exact(&mut decision).await.unwrap();
            host_end
                .write_all(&ServerPayload::outcome(RoundResult::Continue).encode())
                .await
                .unwrap();
            host_end
        });

        let (_, result) = PlayerSession::new(player_end, &config(), Scripted::new(1, &[Decision::Hit]))
            .run()
            .await;
        let _ = host.await.unwrap();

        assert!(matches!(
            result,
            Err(PlayerError::UnexpectedPayload {
                result: RoundResult::Continue,
                during: "turn",
            })
        ));
    }

    #[tokio::test]
    async fn test_host_hangs_up() {
        let (host_end, player_end) = duplex(1024);
        drop(host_end);

        let (presenter, result) = PlayerSession::new(player_end, &config(), Scripted::new(1, &[]))
            .run()
            .await;
        assert!(matches!(result, Err(PlayerError::Connection(ConnectionError::Closed))));
        assert_eq!(presenter.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let deadline = Duration::from_millis(20);
        let result = with_deadline(deadline, std::future::pending::<io::Result<()>>()).await;
        assert!(matches!(result, Err(ConnectionError::Timeout(d)) if d == deadline));
    }

    #[tokio::test]
    async fn test_deadline_passes_io_errors_through() {
        let refused = async { Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionRefused)) };
        let result = with_deadline(Duration::from_secs(1), refused).await;
        assert!(matches!(result, Err(ConnectionError::Io(ref e)) if e.kind() == io::ErrorKind::ConnectionRefused));
    }

    #[tokio::test]
    async fn test_connect_to_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let session = PlayerSession::connect(addr, &config(), Scripted::new(0, &[])).await;
        assert!(session.is_ok());
        let (_, peer) = listener.accept().await.unwrap();
        assert!(peer.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = PlayerSession::connect(addr, &config(), Scripted::new(1, &[])).await;
        let err = result.err().expect("nothing listens there");
        assert!(!matches!(err, ConnectionError::Timeout(_)));
    }

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.team_name, "TheHighRollers");
        assert_eq!(config.discovery_port, 13122);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_vars() {
        let config = PlayerConfig::from_vars(|key| match key {
            "BLACKJACK_TEAM_NAME" => Some("Counters".to_string()),
            "BLACKJACK_DISCOVERY_PORT" => Some("14000".to_string()),
            _ => None,
        });
        assert_eq!(config.team_name, "Counters");
        assert_eq!(config.discovery_port, 14000);
        assert_eq!(config.recv_timeout, PlayerConfig::default().recv_timeout);
    }

    #[test]
    fn test_config_unparsable_port_keeps_default() {
        let config = PlayerConfig::from_vars(|key| match key {
            "BLACKJACK_DISCOVERY_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.discovery_port, DISCOVERY_PORT);
        assert_eq!(config.team_name, "TheHighRollers");

        let config = PlayerConfig::from_vars(|key| match key {
            "BLACKJACK_DISCOVERY_PORT" => Some("70000".to_string()),
            _ => None,
        });
        assert_eq!(config.discovery_port, DISCOVERY_PORT);
    }
}
