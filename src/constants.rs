//! Constants shared across the bot

/// Values used when the environment does not provide one
pub(crate) mod defaults {
	/// Prefix used in direct messages and in guilds without a custom prefix
	pub(crate) const PREFIX: &str = ">";
	/// Name of the `MongoDB` database
	pub(crate) const DATABASE_NAME: &str = "clutter";
	/// Seconds an unused cache entry is kept
	pub(crate) const CACHE_COOLDOWN: u64 = 60;
	/// Filter used when `RUST_LOG` is not set
	pub(crate) const LOG_FILTER: &str = "clutter=info,warn";
}

/// Spam control parameters
pub(crate) mod spam {
	use std::time::Duration;

	/// Commands a user may run in one window
	pub(crate) const RATE: u32 = 10;
	/// Length of a window
	pub(crate) const PER: Duration = Duration::from_secs(12);
	/// Consecutive overflows leading to a blacklist
	pub(crate) const STRIKES: u32 = 3;
}

/// Limits on user provided values
pub(crate) mod limits {
	/// Longest accepted guild prefix
	pub(crate) const MAX_PREFIX_LENGTH: usize = 10;
}

/// Links shown to users
pub(crate) mod urls {
	/// The documentation website
	pub(crate) const DOCUMENTATION: &str = "https://clutter-development.github.io/";
	/// The source repository
	pub(crate) const SOURCE: &str = "https://github.com/Clutter-Development/Clutter";
}

/// Database paths of the settings the bot stores
pub(crate) mod paths {
	/// Custom prefix of a guild
	pub(crate) fn guild_prefix(guild_id: u64) -> String {
		format!("guilds.{guild_id}.prefix")
	}

	/// Preferred language of a guild
	pub(crate) fn guild_language(guild_id: u64) -> String {
		format!("guilds.{guild_id}.language")
	}

	/// Whether a guild is blacklisted
	pub(crate) fn guild_blacklisted(guild_id: u64) -> String {
		format!("guilds.{guild_id}.blacklisted")
	}

	/// Preferred language of a user
	pub(crate) fn user_language(user_id: u64) -> String {
		format!("users.{user_id}.language")
	}

	/// Whether a user is blacklisted
	pub(crate) fn user_blacklisted(user_id: u64) -> String {
		format!("users.{user_id}.blacklisted")
	}
}
