//! Repository implementations backed by sqlx.

pub mod entity;
pub mod token;

pub use entity::{EntityRepository, SqlxEntityRepository};
pub use token::{SessionTokenRepository, SqlxSessionTokenRepository};
