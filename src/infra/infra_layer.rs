// The infra module contains implementations of core traits.
// Each external collaborator gets its own submodule.

#[path = "sheets/mod.rs"]
pub mod sheets;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "discord/mod.rs"]
pub mod discord;
