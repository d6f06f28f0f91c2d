//! Clutter, a multipurpose `Discord` bot backed by a cached `MongoDB` store

mod checks;
mod commands;
mod constants;
mod database;
mod embed;
mod events;
mod logging;
mod spam;
mod states;
mod translation;

use crate::{
	checks::command_check,
	commands::{command_on_error, dynamic_prefix, post_command, pre_command},
	events::event_handler,
	logging::setup_logging,
	states::{ArcData, Config, Data, Framework},
};
use anyhow::{anyhow, Context};
use poise::{
	serenity_prelude::{ClientBuilder, GatewayIntents},
	PrefixFrameworkOptions,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// Build the `poise` [framework](poise::Framework)
#[instrument]
fn build_framework(data: ArcData) -> Framework {
	Framework::builder()
		.setup({
			let data = Arc::clone(&data);
			move |_ctx, _ready, _framework| Box::pin(async move { Ok(data) })
		})
		.options(poise::FrameworkOptions {
			pre_command,
			on_error: command_on_error,
			post_command,
			command_check: Some(command_check),
			event_handler: |ctx, event, fw, data| Box::pin(event_handler(ctx, event, fw, data)),
			prefix_options: PrefixFrameworkOptions {
				dynamic_prefix: Some(dynamic_prefix),
				mention_as_prefix: true,
				case_insensitive_commands: true,
				..Default::default()
			},
			commands: {
				use commands::{helpers, help, info, invite, language, ping, prefix};

				#[rustfmt::skip]
				let mut commands = vec![
					help(),
					ping(),
					info(),
					invite(),
					prefix(),
					language(),
					helpers::owner(),
				];

				data.translations
					.apply_translations_to_interactions(&mut commands, None);

				commands
			},
			..Default::default()
		})
		.initialize_owners(true)
		.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::from_dotenv().context("failed to load configuration")?;
	setup_logging(&config)?;

	let data = Arc::new(Data::new(config).await?);

	let mut client = ClientBuilder::new(
		data.config.discord_token.expose_secret(),
		GatewayIntents::GUILDS
			| GatewayIntents::GUILD_MESSAGES
			| GatewayIntents::DIRECT_MESSAGES
			| GatewayIntents::MESSAGE_CONTENT,
	)
	.framework(build_framework(Arc::clone(&data)))
	.await?;

	if let Err(error) = client.start().await {
		return Err(anyhow!("Client exited with error: {}", error));
	}

	Ok(())
}
