//! chatgate core library — request admission and identity tokens.
//!
//! `chatgate-core` holds the stateful pieces that sit in front of every
//! request handled by the chatgate server. It has no knowledge of HTTP so
//! the same primitives can back any transport.
//!
//! # Modules
//!
//! - [`counter_map`] — [`ConcurrentCounterMap`], a lock-protected key → count registry.
//! - [`limiter`] — [`RateLimiter`], the fixed-window admission check and its maintenance loop.
//! - [`token`] — [`TokenAuthority`], issuance and verification of signed, expiring [`Claims`].
//! - [`clock`] — wall-clock abstraction so token expiry can be driven by tests.
//! - [`users`] — the [`UserStore`] collaborator interface and an in-memory store.
//! - [`error`] — Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod clock;
pub mod counter_map;
pub mod error;
pub mod limiter;
pub mod token;
pub mod users;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter_map::ConcurrentCounterMap;
pub use error::{CoreError, CoreResult};
pub use limiter::{RateLimitPolicy, RateLimiter};
pub use token::{Claims, IssuedToken, SigningSecret, TokenAuthority, DEFAULT_TOKEN_TTL, ISSUER};
pub use users::{MemoryUserStore, UserRecord, UserStore};
