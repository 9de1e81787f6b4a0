#![forbid(unsafe_code)]

//! Verification core for the three ways a Telegram user proves their
//! identity to a host identity provider:
//!
//! - [`login_widget`] — the classic Login Widget callback payload, signed
//!   with HMAC-SHA256 under `SHA256(bot_token)`;
//! - [`init_data`] — a Mini App's `initData` query string, signed under the
//!   two-stage `HMAC-SHA256("WebAppData", bot_token)` derivation;
//! - [`oidc`] — an RS256 ID token checked against Telegram's published JWKS,
//!   plus scope building and claims-to-user mapping.
//!
//! The verifiers are stateless, take already-parsed input, and answer with a
//! boolean: any failure on these adversarially-exercised paths collapses to
//! `false` rather than an error the caller would have to match on. HTTP
//! wiring, sessions and account linking live outside this crate.

mod crypto;
pub mod error;
pub mod init_data;
pub mod login_widget;
pub mod oidc;

pub use error::ParseError;
pub use init_data::{Chat, InitData, User};
pub use login_widget::LoginWidgetPayload;
pub use oidc::{
    build_scopes, get_user_info, get_user_info_with, IdTokenClaims, ResolvedUser, ScopeOptions,
    TelegramOidc, TokenResponse, UserInfo,
};
