//! zoe - chat session core for the Zoe assistant
//!
//! Message history, the send round trip, feedback reporting and bearer token
//! resolution. Rendering is left to the front-end; see `main.rs` for the
//! terminal one.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod store;
pub mod terminal;

pub use auth::{CredentialResolver, Credentials, IdentityClient, TokenProvider};
pub use client::{ChatTransport, HttpTransport};
pub use error::{AuthError, ChatError, IdentityError, TransportError};
pub use message::{Feedback, Message, Role};
pub use session::{ChatSession, FeedbackReport, Rejection, RemoteSync, SubmitOutcome};
pub use store::ConversationStore;
