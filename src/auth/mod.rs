//! Authentication Module
//! Mission: Sessions, token rotation, and access gating for the API

pub mod account_store;
pub mod api;
pub mod google;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod session;

pub use account_store::AccountStore;
pub use api::AuthState;
pub use google::GoogleVerifier;
pub use jwt::TokenService;
pub use middleware::auth_middleware;
pub use session::SessionManager;
