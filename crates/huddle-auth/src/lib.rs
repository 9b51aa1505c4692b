//! # huddle-auth
//!
//! The identity collaborator for the huddle relay.
//!
//! The relay core needs exactly one capability from here: turn a bearer
//! credential into an [`Identity`]. That capability is the [`Authenticator`]
//! trait. The shipped implementation, [`JwtAuthenticator`], validates HS256
//! tokens with [`TokenCodec`] and resolves the `user_id` claim through a
//! [`UserDirectory`].

#![deny(unsafe_code)]

pub mod authenticator;
pub mod bearer;
pub mod directory;
pub mod errors;
pub mod token;

pub use authenticator::{Authenticator, Identity, JwtAuthenticator};
pub use bearer::bearer_token_from_header;
pub use directory::{StaticDirectory, UserDirectory, UserRecord};
pub use errors::{AuthError, Result};
pub use token::{Claims, TokenCodec};
