// The core module contains all business logic.
// Nothing in here talks HTTP - infra implements the traits the core defines.

#[path = "coaching/mod.rs"]
pub mod coaching;

#[path = "ai/mod.rs"]
pub mod ai;
