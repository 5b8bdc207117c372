//! HTTP API handlers for river-server

pub mod auth;
pub mod health;
pub mod songs;
pub mod stream;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use songs::{get_song, list_songs, reload_songs};
pub use stream::stream_song;
