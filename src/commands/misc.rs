//! Informational commands available to everyone

use crate::{
	constants::urls,
	database::DocumentStore,
	embed::{full_timestamp, EmbedKind},
	states::{Context, ContextPolyfill, InteractionResult},
	translation::{localize, Translate},
};
use fluent::fluent_args;
use poise::{
	command,
	builtins::HelpConfiguration,
	serenity_prelude::{CreateActionRow, CreateButton, Permissions, RoleId, User},
	CreateReply,
};
use std::time::{Duration, Instant};

/// Render a latency in whole milliseconds
fn millis(latency: Duration) -> String {
	latency.as_millis().to_string()
}

/// Show the latencies of the bot
#[command(prefix_command, slash_command, aliases("latency", "pong"))]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn ping(ctx: Context<'_>) -> InteractionResult {
	let local = localize(ctx).await;
	let data = ctx.data();
	let title = local.translate("ping-title", None);

	let started = Instant::now();
	let handle = ctx
		.reply_embed(
			EmbedKind::Info,
			title.as_str(),
			local.translate("ping-measuring", None),
		)
		.await?;
	let message = started.elapsed();

	let database = data.database.ping().await?;
	let websocket = ctx.ping().await;

	let description = local.translate(
		"ping-latencies",
		Some(fluent_args![
			"websocket" => millis(websocket),
			"message" => millis(message),
			"database" => millis(database),
			"cached" => data.database.len()
		]),
	);

	handle
		.edit(
			ctx,
			CreateReply::default().embed(data.style.embed(EmbedKind::Info, title, description)),
		)
		.await?;

	Ok(())
}

/// Get the links to invite the bot and join the support server
#[command(prefix_command, slash_command)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn invite(ctx: Context<'_>) -> InteractionResult {
	let local = localize(ctx).await;
	let data = ctx.data();

	let bot_invite = format!(
		"https://discord.com/oauth2/authorize?client_id={}&permissions={}&scope=bot%20applications.commands",
		ctx.framework().bot_id,
		Permissions::ADMINISTRATOR.bits(),
	);

	let mut buttons = vec![CreateButton::new_link(bot_invite).label(local.translate("invite-bot", None))];

	if let Some(support) = &data.config.support_invite_url {
		buttons.push(CreateButton::new_link(support).label(local.translate("invite-support", None)));
	}

	buttons.push(
		CreateButton::new_link(urls::DOCUMENTATION).label(local.translate("invite-documentation", None)),
	);
	buttons.push(CreateButton::new_link(urls::SOURCE).label(local.translate("invite-source", None)));

	let embed = data.style.embed(
		EmbedKind::Info,
		local.translate("invite-title", None),
		local.translate("invite-description", None),
	);

	ctx.send(
		CreateReply::default()
			.embed(embed)
			.components(vec![CreateActionRow::Buttons(buttons)])
			.reply(true),
	)
	.await?;

	Ok(())
}

/// Mentions of `roles`, `None` when there are none
fn mention_roles(roles: &[RoleId]) -> Option<String> {
	if roles.is_empty() {
		return None;
	}

	Some(
		roles
			.iter()
			.map(|role| format!("<@&{role}>"))
			.collect::<Vec<_>>()
			.join(", "),
	)
}

/// Show information about a user
#[command(prefix_command, slash_command)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn info(ctx: Context<'_>, user: Option<User>) -> InteractionResult {
	let local = localize(ctx).await;
	let user = user.as_ref().unwrap_or_else(|| ctx.author());

	let mut embed = ctx
		.data()
		.style
		.embed(
			EmbedKind::Info,
			local.translate("info-title", Some(fluent_args!["user" => user.name.as_str()])),
			"",
		)
		.thumbnail(user.face())
		.field(local.translate("info-id", None), user.id.to_string(), false)
		.field(
			local.translate("info-created", None),
			full_timestamp(user.id.created_at()),
			false,
		);

	if let Some(guild_id) = ctx.guild_id() {
		// Users who are not members simply get no guild fields
		if let Ok(member) = guild_id.member(ctx, user.id).await {
			if let Some(joined_at) = member.joined_at {
				embed = embed.field(
					local.translate("info-joined", None),
					full_timestamp(joined_at),
					false,
				);
			}

			embed = embed.field(
				local.translate("info-roles", None),
				mention_roles(&member.roles).unwrap_or_else(|| local.translate("info-no-roles", None)),
				false,
			);
		}
	}

	ctx.send(CreateReply::default().embed(embed).reply(true))
		.await?;

	Ok(())
}

/// Show the available commands or the help of one command
#[command(prefix_command, slash_command, track_edits)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn help(
	ctx: Context<'_>,
	#[rest]
	#[autocomplete = "poise::builtins::autocomplete_command"]
	command: Option<String>,
) -> InteractionResult {
	let local = localize(ctx).await;
	let footer = local.translate(
		"help-footer",
		Some(fluent_args!["documentation" => urls::DOCUMENTATION]),
	);

	poise::builtins::help(
		ctx,
		command.as_deref(),
		HelpConfiguration {
			extra_text_at_bottom: &footer,
			ephemeral: true,
			..Default::default()
		},
	)
	.await?;

	Ok(())
}
