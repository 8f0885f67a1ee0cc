//! # Glyphsmith Session
//!
//! The conversation layer: per-user state machine, session lifecycle,
//! dispatch from channels and the operator side channel.
//!
//! ```text
//! Channel ──► Dispatcher ──► SessionManager (per-user lock)
//!                               │
//!                               ▼
//!                         SessionEngine ──► OutlineStore
//!                               │              │
//!                               ▼              ▼
//!                        OperatorNotifier   FontAssembler
//! ```

pub mod dispatcher;
pub mod engine;
pub mod lifecycle;
pub mod messages;
pub mod notify;
pub mod state;

pub use dispatcher::Dispatcher;
pub use engine::{DEFAULT_MAX_OUTLINE_BYTES, SessionEngine};
pub use lifecycle::{SessionManager, SessionSlot, release_assets};
pub use notify::{BestEffort, ChannelOperator, NullOperator, OperatorNotifier};
pub use state::{Session, SessionState};
