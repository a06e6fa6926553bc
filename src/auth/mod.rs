//! Authentication: personal access tokens, the OAuth 2.0 browser flow and the
//! per-invocation [`Session`].
//!
//! PAT logins are validated with `GET /users/me` and stored as-is. OAuth logins
//! run a local callback listener on port 8080 and store the access token, refresh
//! token and expiry. [`Session::establish`] refreshes OAuth tokens that expire
//! within five minutes before any API call is made.

pub mod callback;
pub mod oauth;
pub mod session;

pub use oauth::{OAuthCredentials, TokenResponse, run_login_flow};
pub use session::{Session, needs_refresh, now_millis};
