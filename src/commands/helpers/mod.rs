//! Commands restricted to the bot owners

use crate::states::{Command, Context, InteractionResult};
use poise::{
	command,
	serenity_prelude::{self as serenity, GuildId, Http},
};

mod blacklist;
mod register;

use blacklist::owner_blacklist;
use register::owner_register;

/// A set of commands restricted to owners
#[allow(clippy::unused_async)]
#[command(
	prefix_command,
	slash_command,
	owners_only,
	hide_in_help,
	subcommands("owner_blacklist", "owner_register")
)]
pub(crate) async fn owner(_: Context<'_>) -> InteractionResult {
	Ok(())
}

/// Register all slash and context menu commands in a guild
pub(crate) async fn register_(
	http: &Http,
	guild_id: &GuildId,
	commands: &[Command],
) -> Result<usize, serenity::Error> {
	let mut commands_collector = Vec::new();

	for command in commands {
		if let Some(slash_command) = command.create_as_slash_command() {
			commands_collector.push(slash_command);
		}

		if let Some(context_menu_command) = command.create_as_context_menu_command() {
			commands_collector.push(context_menu_command);
		}
	}

	let count = commands_collector.len();
	guild_id.set_commands(http, commands_collector).await?;

	Ok(count)
}
