//! Synchronization core of a two-party chat: keeps one conversation
//! consistent across optimistic local sends, server-confirmed rows and
//! out-of-order real-time channel events.

pub mod config;
pub mod error;
pub mod identity;
pub mod merge;
pub mod pagination;
pub mod presence;
pub mod preview;
pub mod session;
pub mod store;
pub mod types;
pub mod typing;
pub mod validate;

pub use error::{StoreError, SyncError};
pub use session::{ChatSession, EventOutcome};
pub use types::{ChannelEvent, Message, MessageId, MessageKind, Pairing, PairId, UserId};
