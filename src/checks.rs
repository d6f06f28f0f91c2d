//! Global command checks and blacklist management

use crate::{
	constants::paths,
	database::{self, DocumentStore},
	embed::{full_timestamp, EmbedKind},
	spam::Verdict,
	states::{Context, Data, Error, InteractionError},
};
use poise::{
	serenity_prelude::{self as serenity, ExecuteWebhook, GuildId, Http, Timestamp, UserId, Webhook},
	BoxFuture,
};
use secrecy::ExposeSecret;
use std::{
	collections::HashSet,
	sync::{Arc, PoisonError},
};

/// Store a blacklist flag, returns whether it changed
async fn set_blacklisted<S: DocumentStore>(
	database: &S,
	path: &str,
	blacklisted: bool,
) -> Result<bool, database::Error> {
	if database.get_as(path, false).await? == blacklisted {
		return Ok(false);
	}

	database.set(path, blacklisted.into()).await?;

	Ok(true)
}

/// Whether the user is blacklisted
pub(crate) async fn is_user_blacklisted<S: DocumentStore>(
	database: &S,
	user_id: UserId,
) -> Result<bool, database::Error> {
	database
		.get_as(&paths::user_blacklisted(user_id.get()), false)
		.await
}

/// Whether the guild is blacklisted
pub(crate) async fn is_guild_blacklisted<S: DocumentStore>(
	database: &S,
	guild_id: GuildId,
) -> Result<bool, database::Error> {
	database
		.get_as(&paths::guild_blacklisted(guild_id.get()), false)
		.await
}

/// Blacklist or lift the blacklist of a user, returns whether it changed
pub(crate) async fn set_user_blacklisted<S: DocumentStore>(
	database: &S,
	user_id: UserId,
	blacklisted: bool,
) -> Result<bool, database::Error> {
	set_blacklisted(database, &paths::user_blacklisted(user_id.get()), blacklisted).await
}

/// Blacklist or lift the blacklist of a guild, returns whether it changed
pub(crate) async fn set_guild_blacklisted<S: DocumentStore>(
	database: &S,
	guild_id: GuildId,
	blacklisted: bool,
) -> Result<bool, database::Error> {
	set_blacklisted(database, &paths::guild_blacklisted(guild_id.get()), blacklisted).await
}

/// Outcome of screening a guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screening {
	/// The bot may stay
	Stay,
	/// The guild is blacklisted, its owner got blacklisted too
	BlacklistedGuild,
	/// The owner is blacklisted, the guild got blacklisted too
	BlacklistedOwner,
}

/// Decide whether the bot may stay in a guild, spreading the blacklist
///
/// The owner of a blacklisted guild gets blacklisted and so does any guild owned by a
/// blacklisted user. Guilds owned by a bot owner are never screened.
pub(crate) async fn screen<S: DocumentStore>(
	database: &S,
	owners: &HashSet<UserId>,
	guild_id: GuildId,
	owner_id: UserId,
) -> Result<Screening, database::Error> {
	if owners.contains(&owner_id) {
		return Ok(Screening::Stay);
	}

	if is_guild_blacklisted(database, guild_id).await? {
		set_user_blacklisted(database, owner_id, true).await?;

		return Ok(Screening::BlacklistedGuild);
	}

	if is_user_blacklisted(database, owner_id).await? {
		set_guild_blacklisted(database, guild_id, true).await?;

		return Ok(Screening::BlacklistedOwner);
	}

	Ok(Screening::Stay)
}

/// Leave the guild if it or its owner is blacklisted, returns whether the bot stays
pub(crate) async fn screen_guild(
	http: &Http,
	data: &Data,
	owners: &HashSet<UserId>,
	guild_id: GuildId,
	owner_id: UserId,
) -> Result<bool, InteractionError> {
	let reason = match screen(&data.database, owners, guild_id, owner_id).await? {
		Screening::Stay => return Ok(true),
		Screening::BlacklistedGuild => "leaving blacklisted guild",
		Screening::BlacklistedOwner => "leaving guild owned by a blacklisted user",
	};

	tracing::warn!(
		guild_id = guild_id.get(),
		owner_id = owner_id.get(),
		"{reason}"
	);
	guild_id.leave(http).await?;

	Ok(false)
}

/// Send the report of a spam blacklist to the log webhook, if one is configured
fn report_spammer(ctx: Context<'_>) {
	let data = ctx.data();
	let Some(url) = &data.config.log_webhook_url else {
		return;
	};

	let author = ctx.author();
	let mut embed = data
		.style
		.embed(
			EmbedKind::Warning,
			format!("**{}** has been blacklisted for spamming!", author.name),
			format!("Incident time: {}", full_timestamp(Timestamp::now())),
		)
		.field(
			"User Info",
			format!(
				"**Mention:** <@{id}>\n**Name:** {name}\n**ID:** {id}",
				id = author.id,
				name = author.name
			),
			false,
		);

	if let Some(guild_id) = ctx.guild_id() {
		let channel_id = ctx.channel_id();

		embed = embed
			.field(
				"Guild Info",
				format!("**ID:** {guild_id}\n[Jump!](https://discord.com/channels/{guild_id})"),
				false,
			)
			.field(
				"Channel Info",
				format!(
					"**Mention:** <#{channel_id}>\n**ID:** {channel_id}\n[Jump!](https://discord.com/channels/{guild_id}/{channel_id})"
				),
				false,
			);
	}

	let url = url.expose_secret().clone();
	let http = Arc::clone(&ctx.serenity_context().http);

	tokio::spawn(async move {
		let report = async {
			let webhook = Webhook::from_url(&*http, &url).await?;
			webhook
				.execute(&*http, false, ExecuteWebhook::new().embed(embed))
				.await?;

			Ok::<_, serenity::Error>(())
		};

		if let Err(error) = report.await {
			tracing::error!(error = ?error, "failed to report blacklist incident");
		}
	});
}

/// Rate limit the author, blacklisting repeated offenders
async fn spam_check(ctx: Context<'_>) -> Result<(), InteractionError> {
	let data = ctx.data();
	let author = ctx.author();

	let verdict = data
		.spam_control
		.lock()
		.unwrap_or_else(PoisonError::into_inner)
		.hit(author.id.get());

	match verdict {
		Verdict::Allowed => Ok(()),
		Verdict::Cooldown { retry_after } => Err(Error::OnCooldown { retry_after }),
		Verdict::Blacklist => {
			set_user_blacklisted(&data.database, author.id, true).await?;

			tracing::warn!(
				user_id = author.id.get(),
				username = author.name,
				"user blacklisted for spamming"
			);
			report_spammer(ctx);

			Err(Error::UserHasBeenBlacklisted)
		}
	}
}

/// Run before every command, prefix or slash
///
/// Returns `Ok(false)` to silently drop the command, errors are reported to the user.
pub(crate) fn command_check(ctx: Context<'_>) -> BoxFuture<'_, Result<bool, InteractionError>> {
	Box::pin(async move {
		let data = ctx.data();
		let framework = ctx.framework();
		let owners = &framework.options.owners;
		let is_owner = owners.contains(&ctx.author().id);

		if data.config.development_mode && !is_owner {
			return Err(Error::BotInMaintenance);
		}

		if let Some(guild) = ctx.partial_guild().await {
			if !screen_guild(ctx.http(), data, owners, guild.id, guild.owner_id).await? {
				return Ok(false);
			}
		}

		if is_owner {
			return Ok(true);
		}

		if is_user_blacklisted(&data.database, ctx.author().id).await? {
			return Err(Error::UserIsBlacklisted);
		}

		spam_check(ctx).await?;

		Ok(true)
	})
}
