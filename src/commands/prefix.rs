//! Per guild command prefix

use crate::{
	constants::{limits, paths},
	database::{self, DocumentStore, Expiry},
	embed::EmbedKind,
	states::{Context, ContextPolyfill, Data, InteractionResult},
	translation::{localize, Translate},
};
use fluent::fluent_args;
use poise::{command, serenity_prelude::GuildId};

/// The prefix configured for the guild or the default one
///
/// Prefixes are read on every message, they stay cached until changed.
pub(crate) async fn guild_prefix(data: &Data, guild_id: GuildId) -> Result<String, database::Error> {
	let prefix = data
		.database
		.get_as_with::<Option<String>>(&paths::guild_prefix(guild_id.get()), None, Expiry::Never)
		.await?;

	Ok(prefix.unwrap_or_else(|| data.config.default_prefix.clone()))
}

/// Reply with the prefix of the guild
async fn show_prefix(ctx: Context<'_>, guild_id: GuildId) -> InteractionResult {
	let prefix = guild_prefix(ctx.data(), guild_id).await?;
	let local = localize(ctx).await;

	ctx.reply_embed(
		EmbedKind::Info,
		local.translate("prefix-current", Some(fluent_args!["prefix" => prefix])),
		"",
	)
	.await?;

	Ok(())
}

/// Show or change the prefix of this guild
#[command(
	prefix_command,
	slash_command,
	guild_only,
	subcommands("prefix_show", "prefix_set", "prefix_reset")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn prefix(ctx: Context<'_>) -> InteractionResult {
	let Some(guild_id) = ctx.guild_id() else {
		return Ok(());
	};

	show_prefix(ctx, guild_id).await
}

/// Show the prefix of this guild
#[command(prefix_command, slash_command, guild_only, rename = "show")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn prefix_show(ctx: Context<'_>) -> InteractionResult {
	let Some(guild_id) = ctx.guild_id() else {
		return Ok(());
	};

	show_prefix(ctx, guild_id).await
}

/// Change the prefix of this guild
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "set",
	required_permissions = "MANAGE_GUILD"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn prefix_set(ctx: Context<'_>, prefix: String) -> InteractionResult {
	let Some(guild_id) = ctx.guild_id() else {
		return Ok(());
	};

	let local = localize(ctx).await;
	let prefix = prefix.trim();

	if prefix.is_empty() || prefix.chars().count() > limits::MAX_PREFIX_LENGTH {
		ctx.reply_embed(
			EmbedKind::Error,
			local.translate(
				"prefix_set-invalid",
				Some(fluent_args!["max" => limits::MAX_PREFIX_LENGTH]),
			),
			"",
		)
		.await?;

		return Ok(());
	}

	ctx.data()
		.database
		.set(&paths::guild_prefix(guild_id.get()), prefix.into())
		.await?;

	tracing::info!(guild_id = guild_id.get(), prefix, "guild prefix changed");

	ctx.reply_embed(
		EmbedKind::Success,
		local.translate("prefix_set-success", Some(fluent_args!["prefix" => prefix])),
		"",
	)
	.await?;

	Ok(())
}

/// Restore the default prefix of this guild
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "reset",
	required_permissions = "MANAGE_GUILD"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn prefix_reset(ctx: Context<'_>) -> InteractionResult {
	let Some(guild_id) = ctx.guild_id() else {
		return Ok(());
	};

	ctx.data()
		.database
		.remove(&paths::guild_prefix(guild_id.get()))
		.await?;

	let local = localize(ctx).await;

	ctx.reply_embed(
		EmbedKind::Success,
		local.translate(
			"prefix_reset-success",
			Some(fluent_args!["prefix" => ctx.data().config.default_prefix.as_str()]),
		),
		"",
	)
	.await?;

	Ok(())
}
