pub mod auth;
pub mod feed;
pub mod pins;
pub mod profile;
pub mod responses;
pub mod router;
pub mod session;
pub mod state;
pub mod templates;
pub mod uploads;

pub use state::AppState;
