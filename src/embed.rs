//! Styled embeds

use poise::serenity_prelude::{Colour, CreateEmbed, Timestamp};

/// The flavour of an embed, selects its emoji and colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EmbedKind {
	/// An operation went fine
	Success,
	/// An operation failed
	Error,
	/// Something deserves attention
	Warning,
	/// Plain information
	Info,
}

/// Emoji and colour of one [`EmbedKind`]
#[derive(Debug, Clone)]
pub(crate) struct Asset {
	/// Emoji prepended to the title
	pub(crate) emoji: String,
	/// Colour of the embed side bar
	pub(crate) colour: Colour,
}

impl Asset {
	/// Build an asset from an emoji and an `RGB` colour
	fn new(emoji: &str, colour: u32) -> Self {
		Self {
			emoji: emoji.into(),
			colour: Colour::new(colour),
		}
	}
}

/// The look of every embed sent by the bot
#[derive(Debug, Clone)]
pub(crate) struct Style {
	/// Look of [`EmbedKind::Success`] embeds
	pub(crate) success: Asset,
	/// Look of [`EmbedKind::Error`] embeds
	pub(crate) error: Asset,
	/// Look of [`EmbedKind::Warning`] embeds
	pub(crate) warning: Asset,
	/// Look of [`EmbedKind::Info`] embeds
	pub(crate) info: Asset,
}

impl Default for Style {
	fn default() -> Self {
		Self {
			success: Asset::new("<:success:889206855321157683>", 0x34_c7_89),
			error: Asset::new("<:error:911240678342819870>", 0xff_00_5c),
			warning: Asset::new("<:warning:889206830637666334>", 0x00_6a_ff),
			info: Asset::new("<:info:889206906588106824>", 0x65_64_79),
		}
	}
}

impl Style {
	/// The look of `kind`
	pub(crate) const fn asset(&self, kind: EmbedKind) -> &Asset {
		match kind {
			EmbedKind::Success => &self.success,
			EmbedKind::Error => &self.error,
			EmbedKind::Warning => &self.warning,
			EmbedKind::Info => &self.info,
		}
	}

	/// The title decorated with the emoji of `kind`
	pub(crate) fn title(&self, kind: EmbedKind, title: &str) -> String {
		let emoji = &self.asset(kind).emoji;

		format!("{emoji} {title}").trim().to_owned()
	}

	/// Build an embed of the given `kind`, empty title or description are left out
	pub(crate) fn embed(
		&self,
		kind: EmbedKind,
		title: impl Into<String>,
		description: impl Into<String>,
	) -> CreateEmbed {
		let (title, description) = (title.into(), description.into());
		let mut embed = CreateEmbed::new().colour(self.asset(kind).colour);

		if !title.is_empty() {
			embed = embed.title(self.title(kind, &title));
		}

		if !description.is_empty() {
			embed = embed.description(description);
		}

		embed
	}
}

/// Markdown rendering `timestamp` as a full date in the reader's timezone
pub(crate) fn full_timestamp(timestamp: Timestamp) -> String {
	format!("<t:{}:F>", timestamp.unix_timestamp())
}
