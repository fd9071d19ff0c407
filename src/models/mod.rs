//! Core data models for the score storage service.
//!
//! Metadata rows map to structs via `sqlx::FromRow` and serialize as JSON via
//! `serde`. Payload bytes never appear in these rows directly; they pass
//! through [`binary::BinaryColumn`] first.

pub mod binary;
pub mod kind;
pub mod object;
