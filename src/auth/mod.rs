//! # Auth Module
//!
//! Sign-in for comment authors:
//! - OAuth2 login with GitHub and Google
//! - One-time state ledger guarding the callback
//! - Mapping provider identities onto local users
//! - Cookie session binding and the `AuthedUser` extractor

pub mod extractors;
pub mod flow;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod providers;
pub mod resolver;
pub mod routes;
pub mod session;


pub use extractors::{AuthedUser, MaybeUser};
pub use flow::AuthFlow;
pub use ledger::StateLedger;
pub use models::User;
pub use providers::ProviderRegistry;
pub use resolver::IdentityResolver;
pub use routes::auth_routes;
