//! Costanza Rust Client
//!
//! Client-side session and request gateway for the Costanza learning platform:
//! persisted login state, bearer credential attachment, single-flight token
//! renewal on expiry and OAuth popup completion.

pub mod api;
pub mod auth_client;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod navigator;
pub mod oauth;
pub mod session;
pub mod storage;
pub mod token_store;
pub mod types;

pub use api::CostanzaApi;
pub use auth_client::AuthApi;
pub use config::ClientConfig;
pub use context::{provide, try_use_session, use_session};
pub use error::{ClientError, Result};
pub use gateway::{ApiRequest, ApiResponse, RequestGateway};
pub use navigator::{Navigator, NoopNavigator};
pub use oauth::{
    credential_channel, AuthMessage, CredentialEvent, CredentialSender, EventOutcome,
    OAuthCallback, SocialCallback,
};
pub use session::{SessionManager, MIN_PASSWORD_LENGTH};
pub use storage::{DurableStorage, FileStorage, MemoryStorage};
pub use token_store::TokenStore;
pub use types::{AuthStatus, CredentialPair, Session, SessionSnapshot, UserIdentity};
