//! # Authentication Module
//!
//! Account identity and credential access for the sync core.
//!
//! ## Overview
//!
//! Authorization flows are owned by the host. This crate defines what the
//! sync core needs from them: a [`ProfileId`] per account, a redacting
//! [`AccessToken`], and the [`CredentialProvider`] seam whose
//! [`AuthError::UserActionRequired`] carries an opaque action handle back to
//! the host when only the user can restore access.

pub mod credentials;
pub mod error;
pub mod types;

pub use credentials::{CredentialProvider, StaticCredentialProvider};
pub use error::{AuthError, Result};
pub use types::{AccessToken, ProfileId};
