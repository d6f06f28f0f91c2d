//! `Discord` client events handlers

use crate::{
	checks::screen_guild,
	commands::helpers::register_,
	states::{ArcData, FrameworkContext, InteractionResult},
};
use anyhow::Context;
use poise::serenity_prelude::{self, FullEvent, GuildId, UserId};
use std::collections::HashSet;

/// Screen every guild the bot is in, returns how many it left
///
/// A guild that fails to be screened is logged and skipped.
async fn screen_all_guilds(
	ctx: &serenity_prelude::Context,
	data: &ArcData,
	owners: &HashSet<UserId>,
	guild_ids: &[GuildId],
) -> usize {
	let mut left = 0;

	for &guild_id in guild_ids {
		let screening = async {
			let guild = guild_id.to_partial_guild(&ctx.http).await?;

			screen_guild(&ctx.http, data, owners, guild_id, guild.owner_id).await
		};

		match screening.await {
			Ok(true) => {}
			Ok(false) => left += 1,
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), error = ?error, "failed to screen guild");
			}
		}
	}

	left
}

/// Serenity listener to react to `Discord` events
pub(crate) async fn event_handler(
	ctx: &serenity_prelude::Context,
	event: &FullEvent,
	framework: FrameworkContext<'_>,
	data: &ArcData,
) -> InteractionResult {
	match event {
		FullEvent::Ready { data_about_bot } => {
			for guild_id in &data.config.development_guilds {
				let count = register_(&ctx.http, guild_id, &framework.options.commands)
					.await
					.with_context(|| format!("Could not register commands in guild {guild_id}"))?;

				tracing::info!(guild_id = guild_id.get(), count, "registered development commands");
			}

			tracing::info!(
				guilds = data_about_bot.guilds.len(),
				"`{}` is ready!",
				data_about_bot.user.name
			);

			let guild_ids: Vec<_> = data_about_bot.guilds.iter().map(|guild| guild.id).collect();
			let left = screen_all_guilds(ctx, data, &framework.options.owners, &guild_ids).await;
			tracing::info!(screened = guild_ids.len(), left, "screened current guilds");

			Ok(())
		}

		FullEvent::GuildCreate { guild, is_new } => {
			// Guilds present at start up were screened on ready
			if !is_new.unwrap_or(true) {
				return Ok(());
			}

			tracing::info!(guild_id = guild.id.get(), "Joined guild `{}`", guild.name);
			screen_guild(
				&ctx.http,
				data,
				&framework.options.owners,
				guild.id,
				guild.owner_id,
			)
			.await?;

			Ok(())
		}

		_ => {
			tracing::trace!(event = ?event, "missed event");

			Ok(())
		}
	}
}
