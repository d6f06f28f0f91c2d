//! Per user and per guild reply language

use crate::{
	constants::paths,
	database::DocumentStore,
	embed::EmbedKind,
	states::{Context, ContextPolyfill, InteractionResult},
	translation::{localize, Translate},
};
use fluent::fluent_args;
use poise::command;

/// Autocompletes the available locales
async fn autocomplete_language<'a>(
	ctx: Context<'_>,
	partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
	let partial = partial.to_lowercase();

	ctx.data()
		.translations
		.locales()
		.into_iter()
		.filter(move |locale| locale.to_lowercase().contains(&partial))
}

/// Store `language` at `path`, or remove it when `None`
async fn update_language(ctx: Context<'_>, path: &str, language: Option<String>) -> InteractionResult {
	let data = ctx.data();

	let Some(language) = language else {
		data.database.remove(path).await?;

		let local = localize(ctx).await;
		ctx.reply_embed(
			EmbedKind::Success,
			local.translate("language-reset", None),
			"",
		)
		.await?;

		return Ok(());
	};

	let Some(locale) = data.translations.available(language.trim()) else {
		let local = localize(ctx).await;
		ctx.reply_embed(
			EmbedKind::Error,
			local.translate(
				"language-unknown",
				Some(fluent_args![
					"language" => language,
					"available" => data.translations.locales().join(", ")
				]),
			),
			"",
		)
		.await?;

		return Ok(());
	};

	data.database.set(path, locale.to_string().into()).await?;

	// Confirm in the new language
	let local = localize(ctx).await;
	ctx.reply_embed(
		EmbedKind::Success,
		local.translate(
			"language-set",
			Some(fluent_args!["language" => locale.to_string()]),
		),
		"",
	)
	.await?;

	Ok(())
}

/// Show or change the language of the bot replies
#[command(
	prefix_command,
	slash_command,
	subcommands("language_user", "language_guild")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn language(ctx: Context<'_>) -> InteractionResult {
	let local = localize(ctx).await;

	ctx.reply_embed(
		EmbedKind::Info,
		local.translate(
			"language-current",
			Some(fluent_args![
				"language" => local.locale.to_string(),
				"available" => ctx.data().translations.locales().join(", ")
			]),
		),
		"",
	)
	.await?;

	Ok(())
}

/// Change the language the bot replies to you in, leave empty to reset it
#[command(prefix_command, slash_command, rename = "user")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn language_user(
	ctx: Context<'_>,
	#[autocomplete = autocomplete_language] language: Option<String>,
) -> InteractionResult {
	update_language(ctx, &paths::user_language(ctx.author().id.get()), language).await
}

/// Change the language the bot replies in for this guild, leave empty to reset it
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "guild",
	required_permissions = "MANAGE_GUILD"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn language_guild(
	ctx: Context<'_>,
	#[autocomplete = autocomplete_language] language: Option<String>,
) -> InteractionResult {
	let Some(guild_id) = ctx.guild_id() else {
		return Ok(());
	};

	update_language(ctx, &paths::guild_language(guild_id.get()), language).await
}
