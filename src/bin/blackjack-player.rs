//! Blackjack Table Player
//!
//! Waits for a table offer, plays the requested rounds from the
//! terminal, then goes back to listening.

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use blackjack_table::{
    network::{bind_seeker_port, seek_offer, PlayerConfig, PlayerSession},
    Card, CardOwner, Decision, Outcome, Presenter, SessionStats,
};

#[derive(Parser)]
#[command(version, about = "Join a LAN blackjack table")]
struct PlayerArgs {
    /// Team name sent to the host.
    #[arg(long)]
    team: Option<String>,

    /// UDP port to listen for offers on.
    #[arg(long)]
    discovery_port: Option<u16>,

    /// Play one session and exit.
    #[arg(long)]
    once: bool,
}

/// Plain-text presenter reading from stdin.
struct Console {
    stdin_closed: bool,
}

impl Console {
    /// Read one trimmed line. `None` once stdin is closed.
    fn prompt(&mut self, question: &str) -> Option<String> {
        print!("{} ", question);
        let _ = io::stdout().flush();

        let mut line = String::new();
        let read = tokio::task::block_in_place(|| io::stdin().lock().read_line(&mut line));
        match read {
            Ok(0) | Err(_) => {
                self.stdin_closed = true;
                None
            }
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl Presenter for Console {
    fn on_offer_received(&mut self, addr: SocketAddr, name: &str) {
        println!("Received offer from {} ('{}')", addr.ip(), name);
    }

    fn on_round_start(&mut self, round: u32) {
        println!("\n=== Round {} ===", round);
    }

    fn on_card_dealt(&mut self, card: Card, owner: CardOwner) {
        match owner {
            CardOwner::Player => println!("[Player's card] {}", card),
            CardOwner::Dealer => println!("[Dealer's card] {}", card),
            CardOwner::Unlabeled => println!("{}", card),
        }
    }

    fn on_advice_available(&mut self, suggestion: Decision) {
        println!("[Advisor] Statistically, you should {}", suggestion);
    }

    fn on_round_result(&mut self, outcome: Outcome) {
        println!("{}", "-".repeat(30));
        match outcome {
            Outcome::Win => println!("You win!"),
            Outcome::Loss => println!("You lose."),
            Outcome::Tie => println!("It's a tie."),
        }
        println!("{}", "-".repeat(30));
    }

    fn on_session_stats(&mut self, stats: &SessionStats) {
        println!("Rounds played : {}", stats.rounds_played);
        println!("Wins          : {}", stats.wins);
        println!("Losses        : {}", stats.losses);
        println!("Ties          : {}", stats.ties);
        if stats.rounds_played > 0 {
            println!("Win rate      : {:.2}%", stats.win_rate() * 100.0);
        }
        println!("Hits          : {}", stats.hits);
        println!("Stands        : {}", stats.stands);
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("Session error: {}", message);
    }

    fn on_session_end(&mut self) {
        println!("Session finished. Disconnecting.");
    }

    fn requested_round_count(&mut self) -> u8 {
        let mut question = "How many rounds do you want to play?";
        loop {
            let answer = match self.prompt(question) {
                Some(answer) => answer,
                None => return 0,
            };
            match answer.parse::<u8>() {
                Ok(rounds) if rounds > 0 => return rounds,
                _ => question = "Please enter a number between 1 and 255:",
            }
        }
    }

    fn player_decision(&mut self) -> Decision {
        loop {
            let answer = match self.prompt("Your move (Hit/Stand):") {
                Some(answer) => answer,
                None => return Decision::Stand,
            };
            match answer.to_ascii_lowercase().as_str() {
                "hit" => return Decision::Hit,
                "stand" => return Decision::Stand,
                _ => println!("Please type exactly 'Hit' or 'Stand'."),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = PlayerArgs::parse();
    let mut config = PlayerConfig::from_env();
    if let Some(team) = args.team {
        config.team_name = team;
    }
    if let Some(port) = args.discovery_port {
        config.discovery_port = port;
    }

    let mut console = Console { stdin_closed: false };
    println!("Client started, listening for offer requests...");

    while !console.stdin_closed {
        let seeker = bind_seeker_port(config.discovery_port).await?;
        let host = seek_offer(&seeker).await?;
        drop(seeker);
        console.on_offer_received(host.addr, &host.name);

        match PlayerSession::connect(host.addr, &config, &mut console).await {
            Ok(session) => {
                let (_, result) = session.run().await;
                if let Ok(stats) = result {
                    info!(stats = %stats.to_json().unwrap_or_default(), "session stats");
                }
            }
            Err(e) => {
                warn!(addr = %host.addr, error = %e, "connect failed");
                console.on_error(&e.to_string());
            }
        }

        if args.once {
            break;
        }
    }

    Ok(())
}
