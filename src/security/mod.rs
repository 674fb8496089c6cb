//! Security module for texcollab.
//!
//! Bearer-token gate in front of the REST API and the collaboration socket.
//! Tokens are issued elsewhere; the server only checks them.
//!
//! ```rust
//! use texcollab::security::TokenStore;
//!
//! let tokens = TokenStore::default();
//! tokens.add_token("my-secret-token");
//! assert!(tokens.is_valid("my-secret-token"));
//! ```

pub mod auth;

pub use auth::{auth_middleware, AuthConfig, TokenStore, TOKEN_QUERY_PARAM};
