//! Bot initialization
//!
//! Command enum definition and bot instance creation. The menu tree lives in
//! [`crate::telegram::keyboards`]; slash commands are the small role-free
//! surface registered with Telegram's command list.

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Slash commands the bot understands. Everything else a user can do goes
/// through the reply keyboard.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "show the keyboard")]
    Start,
}

/// Creates a Bot instance from the configured token.
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the underlying HTTP client
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::http_timeout()).build()?;
    Ok(Bot::with_client(config::BOT_TOKEN.clone(), client))
}

/// Registers the command list in the Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_the_only_registered_command() {
        let commands = Command::bot_commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].command.ends_with("start"));
    }
}
