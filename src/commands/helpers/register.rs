//! Application commands registration

use super::register_;
use crate::{
	states::{Context, ContextPolyfill, InteractionResult},
	translation::{localize, Translate},
};
use fluent::fluent_args;
use poise::command;

/// Register application commands in this guild, or globally
#[command(
	prefix_command,
	slash_command,
	owners_only,
	hide_in_help,
	rename = "register"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn owner_register(ctx: Context<'_>, global: Option<bool>) -> InteractionResult {
	let commands = &ctx.framework().options.commands;
	let local = localize(ctx).await;

	if global.unwrap_or(false) {
		poise::builtins::register_globally(ctx.http(), commands).await?;

		tracing::info!(count = commands.len(), "registered commands globally");

		ctx.shout(local.translate(
			"owner_register-global",
			Some(fluent_args!["count" => commands.len()]),
		))
		.await?;

		return Ok(());
	}

	let Some(guild_id) = ctx.guild_id() else {
		ctx.shout(local.translate("owner_register-no-guild", None))
			.await?;

		return Ok(());
	};

	let count = register_(ctx.http(), &guild_id, commands).await?;

	tracing::info!(guild_id = guild_id.get(), count, "registered guild commands");

	ctx.shout(local.translate(
		"owner_register-guild",
		Some(fluent_args!["count" => count]),
	))
	.await?;

	Ok(())
}
