// Core auto-moderation module - rule evaluation, trackers, normalization.
// Following the same pattern as the cooldown and settings modules.

pub mod automod_models;
pub mod automod_service;
pub mod normalize;
pub mod trackers;

pub use automod_models::*;
pub use automod_service::*;
