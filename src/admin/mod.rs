//! User administration against the remote admin API.

pub mod client;
pub mod service;
pub mod session;
pub mod types;

pub use client::AdminClient;
pub use service::UserService;
pub use session::Session;
pub use types::{User, UserCreateRequest, UserUpdateRequest};
