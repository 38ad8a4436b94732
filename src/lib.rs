//! Comments, likes, pins and polls for published articles.
//!
//! The thread builder ([`comment::thread`]) and the tally engine
//! ([`poll::tally`]) are pure. The services drive a [`database::DocumentStore`]
//! and take the acting user from an [`identity::Identity`].

pub mod article;
pub mod comment;
pub mod database;
pub mod identity;
pub mod middleware;
pub mod poll;
pub mod router;
pub mod user;
pub mod utils;
