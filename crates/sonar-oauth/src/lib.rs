//! OAuth 2.0 credential lifecycle and authenticated forwarding.
//!
//! Keeps exactly one upstream identity authenticated for the lifetime of the
//! process and attaches its access token to outbound requests.
//!
//! # Components
//!
//! - [`oauth`]: authorization URL, code exchange and token refresh
//! - [`token_manager`]: credential manager backed by the TTL cache
//! - [`passthrough`]: forwards inbound requests upstream with a bearer token
//! - [`nowplaying`]: read-through cache for the player and queue views

pub mod error;
pub mod nowplaying;
pub mod oauth;
pub mod passthrough;
pub mod token_manager;

pub use error::{OAuthError, Result};
pub use nowplaying::{CacheSnapshotStore, NowPlaying, PlayerQueue, QueueSnapshot, SnapshotStore};
pub use oauth::{OAuthConfig, TokenResponse};
pub use passthrough::{Forwarder, SharedForwarder, UpstreamForwarder};
pub use token_manager::{
    AuthState, CredentialManager, CredentialPair, SharedTokenSource, TokenSource,
};
