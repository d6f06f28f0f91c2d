//! Manage blacklisted users and guilds

use crate::{
	checks::{set_guild_blacklisted, set_user_blacklisted},
	embed::EmbedKind,
	states::{Context, ContextPolyfill, InteractionResult},
	translation::{localize, Translate},
};
use fluent::fluent_args;
use poise::{
	command,
	serenity_prelude::{self as serenity, GuildId, User},
};

/// Whether to add or lift a blacklist
#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub(super) enum Action {
	/// Blacklist the target
	Add,
	/// Lift the blacklist of the target
	Remove,
}

impl Action {
	/// The blacklist flag this action stores
	const fn blacklisted(self) -> bool {
		matches!(self, Self::Add)
	}

	/// Translation key of the reply, depending on whether the state changed
	const fn reply_key(self, changed: bool) -> &'static str {
		match (self, changed) {
			(Self::Add, true) => "owner_blacklist-added",
			(Self::Add, false) => "owner_blacklist-already-blacklisted",
			(Self::Remove, true) => "owner_blacklist-removed",
			(Self::Remove, false) => "owner_blacklist-not-blacklisted",
		}
	}
}

/// Parse a guild id given as text, slash commands cannot carry ids of guilds the user is not in
fn parse_guild_id(guild: &str) -> Option<GuildId> {
	guild
		.trim()
		.parse::<u64>()
		.ok()
		.filter(|id| *id != 0)
		.map(GuildId::new)
}

/// Blacklist users or guilds
#[allow(clippy::unused_async)]
#[command(
	prefix_command,
	slash_command,
	owners_only,
	hide_in_help,
	rename = "blacklist",
	subcommands("owner_blacklist_user", "owner_blacklist_guild")
)]
pub(super) async fn owner_blacklist(_: Context<'_>) -> InteractionResult {
	Ok(())
}

/// Blacklist a user or lift their blacklist
#[command(
	prefix_command,
	slash_command,
	owners_only,
	hide_in_help,
	rename = "user"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn owner_blacklist_user(
	ctx: Context<'_>,
	action: Action,
	user: User,
) -> InteractionResult {
	let local = localize(ctx).await;

	if ctx.framework().options.owners.contains(&user.id) {
		ctx.reply_embed(
			EmbedKind::Error,
			local.translate("owner_blacklist-owner", None),
			"",
		)
		.await?;

		return Ok(());
	}

	let changed = set_user_blacklisted(&ctx.data().database, user.id, action.blacklisted()).await?;

	tracing::info!(user_id = user.id.get(), ?action, changed, "user blacklist updated");

	let kind = if changed { EmbedKind::Success } else { EmbedKind::Warning };
	ctx.reply_embed(
		kind,
		local.translate(
			action.reply_key(changed),
			Some(fluent_args!["target" => user.name.clone()]),
		),
		"",
	)
	.await?;

	Ok(())
}

/// Blacklist a guild or lift its blacklist, the bot leaves blacklisted guilds
#[command(
	prefix_command,
	slash_command,
	owners_only,
	hide_in_help,
	rename = "guild"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn owner_blacklist_guild(
	ctx: Context<'_>,
	action: Action,
	guild: String,
) -> InteractionResult {
	let local = localize(ctx).await;

	let Some(guild_id) = parse_guild_id(&guild) else {
		ctx.reply_embed(
			EmbedKind::Error,
			local.translate(
				"owner_blacklist-invalid-guild",
				Some(fluent_args!["guild" => guild]),
			),
			"",
		)
		.await?;

		return Ok(());
	};

	let changed = set_guild_blacklisted(&ctx.data().database, guild_id, action.blacklisted()).await?;

	tracing::info!(guild_id = guild_id.get(), ?action, changed, "guild blacklist updated");

	let kind = if changed { EmbedKind::Success } else { EmbedKind::Warning };
	ctx.reply_embed(
		kind,
		local.translate(
			action.reply_key(changed),
			Some(fluent_args!["target" => guild_id.to_string()]),
		),
		"",
	)
	.await?;

	if action.blacklisted() {
		match guild_id.leave(ctx.http()).await {
			Ok(()) |
			// Ignore the error if the bot is not in the guild
			Err(serenity::Error::Http(_)) => {}
			Err(error) => return Err(error.into()),
		}
	}

	Ok(())
}
