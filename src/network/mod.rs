//! Network Layer
//!
//! UDP discovery and the TCP table protocol.
//! All rules live in `game/`; this layer only moves messages.

pub mod discovery;
pub mod player;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use discovery::{bind_seeker, bind_seeker_port, seek_offer, DiscoveredHost, DiscoveryError, OfferBroadcaster};
pub use player::{PlayerConfig, PlayerError, PlayerSession};
pub use protocol::{
    ClientPayload, MessageType, Offer, ProtocolError, Request, RoundResult, ServerPayload, WireMessage,
};
pub use server::{HostConfig, TableServer, TableServerError};
pub use session::{
    DeckFactory, HostSession, SessionConfig, SessionError, SessionId, SessionState, SessionSummary,
    ShuffledDecks,
};
pub use transport::{Connection, ConnectionError};
