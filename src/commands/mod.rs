//! `Discord` client commands

use crate::{
	states::{Context, ContextPolyfill, Error, FrameworkError, InteractionError, PartialContext},
	translation::{localize, Translate},
};
use anyhow::Context as _;
use fluent::fluent_args;
use poise::{serenity_prelude, BoxFuture};
use uuid::Uuid;

mod language;
mod misc;
mod prefix;

pub(crate) use language::language;
pub(crate) use misc::{help, info, invite, ping};
pub(crate) use prefix::prefix;
pub(crate) mod helpers;

/// Resolve the prefix of a message, guilds may configure their own
pub(crate) fn dynamic_prefix(
	ctx: PartialContext<'_>,
) -> BoxFuture<'_, Result<Option<String>, InteractionError>> {
	Box::pin(async move {
		let Some(guild_id) = ctx.guild_id else {
			return Ok(Some(ctx.data.config.default_prefix.clone()));
		};

		let prefix = prefix::guild_prefix(ctx.data, guild_id).await?;

		Ok(Some(prefix))
	})
}

/// Execute before each command
pub(crate) fn pre_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::info!(
			user_id = ctx.author().id.get(),
			username = &ctx.author().name,
			command_id = ctx.command().identifying_name,
			"Command invocation",
		);
	})
}

/// Execute on a error during code execution
#[allow(clippy::too_many_lines)]
pub(crate) fn command_on_error(error: FrameworkError) -> BoxFuture<()> {
	Box::pin(async move {
		let error = match error {
			FrameworkError::Command { error, ctx, .. } => handle_interaction_error(ctx, error)
				.await
				.context("failed to send error message"),

			FrameworkError::EventHandler { error, event, .. } => {
				tracing::error!(
					error = ?error,
					event = ?event,
					"event handler",
				);

				Ok(())
			}

			FrameworkError::CommandCheckFailed { ctx, error, .. } => {
				// Without an error the check dropped the command on purpose
				if let Some(err) = error {
					handle_interaction_error(ctx, err)
						.await
						.context("failed to send error message")
				} else {
					Ok(())
				}
			}

			FrameworkError::MissingBotPermissions {
				ctx,
				missing_permissions,
				..
			} => {
				let local = localize(ctx).await;

				ctx.shout(local.translate(
					"error-bot-missing-permissions",
					Some(fluent_args!["permissions" => missing_permissions.to_string()]),
				))
				.await
				.map(|_| ())
				.context("Failed to send missing bot permissions message")
			}

			FrameworkError::MissingUserPermissions {
				ctx,
				missing_permissions,
				..
			} => {
				let local = localize(ctx).await;
				let text = missing_permissions.map_or_else(
					|| local.translate("error-user-missing-unknown-permissions", None),
					|permission| {
						local.translate(
							"error-user-missing-permissions",
							Some(fluent_args!["permissions" => permission.to_string()]),
						)
					},
				);

				ctx.shout(text)
					.await
					.map(|_| ())
					.context("Failed to send missing user permissions message")
			}

			FrameworkError::NotAnOwner { ctx, .. } => {
				let local = localize(ctx).await;

				ctx.shout(local.translate("error-not-an-owner", None))
					.await
					.map(|_| ())
					.context("Failed to send not an owner message")
			}

			FrameworkError::GuildOnly { ctx, .. } => {
				let local = localize(ctx).await;

				ctx.shout(local.translate("error-guild-only", None))
					.await
					.map(|_| ())
					.context("Failed to send guild only message")
			}

			FrameworkError::ArgumentParse { ctx, input, .. } => {
				let local = localize(ctx).await;
				let text = input.map_or_else(
					|| local.translate("error-missing-argument", None),
					|input| {
						local.translate(
							"error-invalid-argument",
							Some(fluent_args!["input" => input]),
						)
					},
				);

				ctx.shout(text)
					.await
					.map(|_| ())
					.context("Failed to send argument parse message")
			}

			FrameworkError::UnknownCommand { .. } => Ok(()),

			error => {
				tracing::error!(error = ?error, "framework");

				Ok(())
			}
		};

		if let Err(error) = error {
			tracing::error!(error = ?error);
		}
	})
}

/// Execute after every successful command
pub(crate) fn post_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::debug!(
			user_id = ctx.author().id.get(),
			username = &ctx.author().name,
			command_id = ctx.command().identifying_name,
			"Command invocation successful",
		);
	})
}

/// Handle our custom command interaction error
async fn handle_interaction_error(
	ctx: Context<'_>,
	error: InteractionError,
) -> serenity_prelude::Result<()> {
	let local = localize(ctx).await;

	let text = match error {
		Error::BotInMaintenance => local.translate("error-maintenance", None),
		Error::UserIsBlacklisted => local.translate("error-user-blacklisted", None),
		Error::UserHasBeenBlacklisted => local.translate("error-user-has-been-blacklisted", None),
		Error::OnCooldown { retry_after } => local.translate(
			"error-on-cooldown",
			Some(fluent_args!["seconds" => format!("{:.1}", retry_after.as_secs_f64())]),
		),
		error => {
			let error_identifier = Uuid::new_v4().hyphenated().to_string();

			tracing::error!(
				user_id = ctx.author().id.get(),
				username = ctx.author().name,
				error_id = error_identifier,
				error = ?error,
				command_id = ctx.command().identifying_name,
				"interaction body or check",
			);

			local.translate(
				"error-internal-with-id",
				Some(fluent_args!["id" => error_identifier]),
			)
		}
	};

	ctx.shout(text).await?;

	Ok(())
}
