// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "automod/message_handler.rs"]
pub mod automod;

use crate::core::automod::AutoModService;
use crate::core::cooldown::CommandCooldowns;
use crate::core::settings::SettingsService;
use crate::infra::settings::SqliteSettingsStore;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Runtime configuration fixed at startup from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// The single community this deployment moderates.
    pub guild_id: u64,
    /// Optional role treated as moderator-equivalent besides real permissions.
    pub moderator_role_id: Option<u64>,
}

/// Data that's shared across all commands and event handlers.
pub struct Data {
    pub automod: Arc<AutoModService>,
    pub settings: Arc<SettingsService<SqliteSettingsStore>>,
    pub roll_cooldowns: Arc<CommandCooldowns>,
    pub config: BotConfig,
}
