//! Handles all the states of the bot and initial configuration

use crate::{
	constants::{defaults, spam},
	database::{self, CachedStore, Database, MongoStore},
	embed::{EmbedKind, Style},
	spam::SpamControl,
	translation::Translations,
};
use anyhow::{anyhow, Context as _};
use dotenvy::dotenv;
use poise::{
	async_trait,
	serenity_prelude::{self as serenity, GuildId},
	CreateReply, ReplyHandle,
};
use secrecy::{ExposeSecret, SecretString};
use std::{
	env::{self, VarError},
	fmt,
	str::FromStr,
	sync::{Arc, Mutex},
	time::Duration,
};
use unic_langid::LanguageIdentifier;

/// App global configuration
#[derive(Debug)]
pub(crate) struct Config {
	/// The token needed to access the `Discord` Api
	pub(crate) discord_token: SecretString,
	/// The guilds in which commands are registered when the bot is ready
	pub(crate) development_guilds: Vec<GuildId>,
	/// The `MongoDB` connection uri
	pub(crate) database_url: SecretString,
	/// The `MongoDB` database holding every collection
	pub(crate) database_name: String,
	/// How long an unused cached read is kept
	pub(crate) cache_cooldown: Duration,
	/// The prefix used where none has been configured
	pub(crate) default_prefix: String,
	/// The webhook receiving blacklist incidents, it embeds its own token
	pub(crate) log_webhook_url: Option<SecretString>,
	/// The invite to the support server
	pub(crate) support_invite_url: Option<String>,

	/// The default locale to use
	pub(crate) default_locale: LanguageIdentifier,
	/// Whether only owners may run commands
	pub(crate) development_mode: bool,
	/// Whether or not to use production defaults
	///
	/// Currently only affects logging
	pub(crate) production: bool,
}

/// Resolve an environment variable or return an appropriate error
fn required_env_var(name: &str) -> anyhow::Result<String> {
	match env::var(name) {
		Ok(val) => Ok(val),
		Err(VarError::NotPresent) => Err(anyhow!("{} must be set in the environnement", name)),
		Err(VarError::NotUnicode(_)) => {
			Err(anyhow!("{} does not contains Unicode valid text", name))
		}
	}
}

/// Resolve an optional environment variable, empty values count as unset
fn optional_env_var(name: &str) -> anyhow::Result<Option<String>> {
	match env::var(name) {
		Ok(val) if val.trim().is_empty() => Ok(None),
		Ok(val) => Ok(Some(val)),
		Err(VarError::NotPresent) => Ok(None),
		Err(VarError::NotUnicode(_)) => {
			Err(anyhow!("{} does not contains Unicode valid text", name))
		}
	}
}

/// Parse an optional environment variable, falling back to `default`
fn parsed_env_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
	optional_env_var(name)?.map_or(Ok(default), |value| {
		value.trim().parse::<T>().map_err(|_| {
			anyhow!(
				"{} environnement variable must be a `{}`",
				name,
				std::any::type_name::<T>()
			)
		})
	})
}

/// Parse a comma separated list of guild ids
fn parse_guild_ids(list: &str) -> anyhow::Result<Vec<GuildId>> {
	list.split(',')
		.map(str::trim)
		.filter(|id| !id.is_empty())
		.map(|id| {
			id.parse::<u64>()
				.ok()
				.filter(|id| *id != 0)
				.map(GuildId::new)
				.ok_or_else(|| anyhow!("`{}` is not a valid guild id", id))
		})
		.collect()
}

impl Config {
	/// Parse the config from the environment, loading the `.env` file first if present
	pub(crate) fn from_dotenv() -> anyhow::Result<Self> {
		if let Err(error) = dotenv() {
			if !error.not_found() {
				return Err(error).context("failed to load the `.env` file");
			}
		}

		let development_guilds = optional_env_var("DISCORD_DEV_GUILDS")?
			.map(|list| parse_guild_ids(&list))
			.transpose()
			.context("DISCORD_DEV_GUILDS environnement variable must be a list of `u64`")?
			.unwrap_or_default();

		let default_locale = required_env_var("DEFAULT_LOCALE")?
			.parse::<LanguageIdentifier>()
			.map_err(|_| {
				anyhow!("DEFAULT_LOCALE environnement variable must be a `LanguageIdentifier`")
			})?;

		Ok(Self {
			discord_token: SecretString::from(required_env_var("DISCORD_TOKEN")?),
			development_guilds,
			database_url: SecretString::from(required_env_var("DATABASE_URL")?),
			database_name: optional_env_var("DATABASE_NAME")?
				.unwrap_or_else(|| defaults::DATABASE_NAME.into()),
			cache_cooldown: Duration::from_secs(parsed_env_var(
				"CACHE_COOLDOWN",
				defaults::CACHE_COOLDOWN,
			)?),
			default_prefix: optional_env_var("DEFAULT_PREFIX")?
				.unwrap_or_else(|| defaults::PREFIX.into()),
			log_webhook_url: optional_env_var("LOG_WEBHOOK_URL")?.map(SecretString::from),
			support_invite_url: optional_env_var("DISCORD_INVITE_URL")?,

			default_locale,
			development_mode: parsed_env_var("DEVELOPMENT_MODE", false)?,
			production: parsed_env_var("PRODUCTION", false)?,
		})
	}
}

/// App global data
pub(crate) struct Data {
	/// An access to the database
	pub(crate) database: Database,
	/// An instance of the parsed initial config
	pub(crate) config: Config,
	/// The translations for the client
	pub(crate) translations: Translations,
	/// Command usage of every user
	pub(crate) spam_control: Mutex<SpamControl>,
	/// Emojis and colours of embeds
	pub(crate) style: Style,
}

impl fmt::Debug for Data {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Data")
			.field("database", &self.database)
			.field("config", &self.config)
			.field("translations", &self.translations)
			.finish_non_exhaustive()
	}
}

impl Data {
	/// Connect to the database and load translations
	pub(crate) async fn new(config: Config) -> anyhow::Result<Self> {
		let store = MongoStore::connect(config.database_url.expose_secret(), &config.database_name)
			.await
			.context("failed to connect to the database")?;

		let translations = Translations::from_folder("translations", config.default_locale.clone())
			.context("failed to load translations")?;

		Ok(Self {
			database: CachedStore::new(store, config.cache_cooldown),
			config,
			translations,
			spam_control: Mutex::new(SpamControl::new(spam::RATE, spam::PER, spam::STRIKES)),
			style: Style::default(),
		})
	}
}

/// Trait for sending ephemeral messages and embeds
#[async_trait]
pub(crate) trait ContextPolyfill: Send + Sync {
	/// Send an ephemeral message to the user
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error>;

	/// Reply with an embed styled after `kind`
	async fn reply_embed(
		&self,
		kind: EmbedKind,
		title: impl Into<String> + Send,
		description: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error>;
}

#[async_trait]
impl ContextPolyfill for Context<'_> {
	#[inline]
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error> {
		self.send(CreateReply::default().content(content).ephemeral(true))
			.await
	}

	#[inline]
	async fn reply_embed(
		&self,
		kind: EmbedKind,
		title: impl Into<String> + Send,
		description: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error> {
		let embed = self.data().style.embed(kind, title, description);

		self.send(CreateReply::default().embed(embed).reply(true))
			.await
	}
}

/// Common wrapper for the [`Data`]
pub(crate) type ArcData = Arc<Data>;
/// Common interaction or event error type
pub(crate) type InteractionError = Error;
/// Common interaction or event return type
pub(crate) type InteractionResult = Result<(), InteractionError>;

/// A [`poise::Command`] type alias with our common types
pub(crate) type Command = poise::Command<ArcData, InteractionError>;
/// A [`poise::Context`] type alias with our common types, provided to each command
pub(crate) type Context<'a> = poise::Context<'a, ArcData, InteractionError>;
/// A [`poise::PartialContext`] type alias with our common types, provided to the prefix resolver
pub(crate) type PartialContext<'a> = poise::PartialContext<'a, ArcData, InteractionError>;

/// A [`poise::Framework`] type alias with our common types
pub(crate) type Framework = poise::Framework<ArcData, InteractionError>;
/// A [`poise::FrameworkContext`] type alias with our common types
pub(crate) type FrameworkContext<'a> = poise::FrameworkContext<'a, ArcData, InteractionError>;
/// A [`poise::FrameworkError`] type alias with our common types
pub(crate) type FrameworkError<'a> = poise::FrameworkError<'a, ArcData, InteractionError>;

/// An error in an interaction or an event
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
	/// A serenity error
	#[error(transparent)]
	Serenity(#[from] serenity::Error),
	/// A database error
	#[error(transparent)]
	Database(#[from] database::Error),
	/// Only owners may run commands while in development mode
	#[error("the bot is in maintenance")]
	BotInMaintenance,
	/// The caller is blacklisted
	#[error("the user is blacklisted")]
	UserIsBlacklisted,
	/// The caller just got blacklisted by spam control
	#[error("the user has been blacklisted for spamming")]
	UserHasBeenBlacklisted,
	/// The caller ran too many commands
	#[error("on cooldown, retry after {retry_after:?}")]
	OnCooldown {
		/// Time until the caller may run commands again
		retry_after: Duration,
	},
	/// Collects any other general purpose error
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}
