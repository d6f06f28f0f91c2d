//! Fluent Project translation system
//!
//! The locale of a reply is the one stored for the user, else the one stored for the
//! guild, else the locale reported by `Discord`, else the fallback locale.

use crate::{
	constants::paths,
	database::{CachedStore, DocumentStore, Expiry},
	states::{Command, Context},
};
use anyhow::anyhow;
use fluent::{bundle, FluentArgs, FluentMessage, FluentResource};
use fluent_syntax::ast::Pattern;
use intl_memoizer::concurrent::IntlLangMemoizer as ConcurrentIntlLangMemoizer;
use std::{
	borrow::Cow,
	collections::HashMap,
	fmt::{Debug, Formatter},
	fs::{read_dir, read_to_string},
	path::Path,
};
use unic_langid::LanguageIdentifier;

/// The concurrent Fluent bundle used to cache the language results
type FluentBundle = bundle::FluentBundle<FluentResource, ConcurrentIntlLangMemoizer>;

/// Manages the client internationalization
pub(crate) struct Translations {
	/// The fallback locale
	fallback: LanguageIdentifier,
	/// The available locales
	bundles: HashMap<LanguageIdentifier, FluentBundle>,
}

impl Debug for Translations {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Translations")
			.field("fallback", &self.fallback)
			.field("bundles", &self.bundles.keys())
			.finish()
	}
}

/// Parses the given Fluent source into a bundle for `locale`
fn bundle_from_source(
	locale: &LanguageIdentifier,
	source: String,
) -> anyhow::Result<FluentBundle> {
	let resource = FluentResource::try_new(source)
		.map_err(|(_, e)| anyhow!("failed to parse `{}` resource: {:?}", locale, e))?;

	// Associate .ftl resource with locale and bundle it
	let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
	bundle
		.add_resource(resource)
		.map_err(|e| anyhow!("failed to add resource to bundle: {:?}", e))?;

	Ok(bundle)
}

/// Reads and parses the given Fluent file
fn read_fluent_file(path: &Path) -> anyhow::Result<(LanguageIdentifier, FluentBundle)> {
	// Extract locale from filename
	let locale: LanguageIdentifier = path
		.file_stem()
		.ok_or_else(|| anyhow!("Invalid `.ftl` file"))?
		.to_str()
		.ok_or_else(|| anyhow!("Invalid UTF-8 filename"))?
		.parse()?;

	let bundle = bundle_from_source(&locale, read_to_string(path)?)?;

	Ok((locale, bundle))
}

impl Translations {
	/// Load all available translations from the given directory
	pub(crate) fn from_folder(folder: &str, fallback: LanguageIdentifier) -> anyhow::Result<Self> {
		let mut bundles = HashMap::new();

		for file in read_dir(folder)? {
			let path = file?.path();

			if matches!(path.extension(), Some(ext) if ext == "ftl") {
				let (locale, bundle) = read_fluent_file(&path)?;
				bundles.insert(locale, bundle);
			}
		}

		Self::from_bundles(bundles, fallback)
	}

	/// Build translations from in memory Fluent sources
	#[cfg(test)]
	pub(crate) fn from_sources(
		sources: &[(&str, &str)],
		fallback: LanguageIdentifier,
	) -> anyhow::Result<Self> {
		let bundles = sources
			.iter()
			.map(|(locale, source)| -> anyhow::Result<_> {
				let locale: LanguageIdentifier = locale.parse()?;
				let bundle = bundle_from_source(&locale, (*source).to_owned())?;

				Ok((locale, bundle))
			})
			.collect::<anyhow::Result<_>>()?;

		Self::from_bundles(bundles, fallback)
	}

	/// Check the fallback locale is available
	fn from_bundles(
		bundles: HashMap<LanguageIdentifier, FluentBundle>,
		fallback: LanguageIdentifier,
	) -> anyhow::Result<Self> {
		if !bundles.contains_key(&fallback) {
			return Err(anyhow!("fallback locale bundle not found"));
		}

		Ok(Self { fallback, bundles })
	}

	/// Every available locale, sorted
	pub(crate) fn locales(&self) -> Vec<String> {
		let mut locales: Vec<_> = self.bundles.keys().map(ToString::to_string).collect();
		locales.sort();

		locales
	}

	/// Parse `locale` if a bundle exists for it
	pub(crate) fn available(&self, locale: &str) -> Option<LanguageIdentifier> {
		locale
			.parse::<LanguageIdentifier>()
			.ok()
			.filter(|locale| self.bundles.contains_key(locale))
	}

	/// The first available locale among `candidates`, or the fallback
	pub(crate) fn pick<I, S>(&self, candidates: I) -> LanguageIdentifier
	where
		I: IntoIterator<Item = Option<S>>,
		S: AsRef<str>,
	{
		candidates
			.into_iter()
			.flatten()
			.find_map(|candidate| self.available(candidate.as_ref()))
			.unwrap_or_else(|| self.fallback.clone())
	}

	/// Formats the given message with the given arguments
	fn format<'bundle>(
		bundle: &'bundle FluentBundle,
		pattern: &'bundle Pattern<&str>,
		args: Option<&'bundle FluentArgs>,
	) -> Cow<'bundle, str> {
		let mut errors = Vec::new();

		let formatted = bundle.format_pattern(pattern, args, &mut errors);

		for error in errors {
			tracing::error!("fluent format pattern error {}", error);
		}

		formatted
	}

	/// Get a translation from the given key or an error
	pub(crate) fn translate_checked<'bundle>(
		&'bundle self,
		locale: &LanguageIdentifier,
		key: &'bundle str,
		args: Option<&'bundle FluentArgs>,
	) -> anyhow::Result<Cow<'bundle, str>> {
		let bundle = self
			.bundles
			.get(locale)
			.or_else(|| self.bundles.get(&self.fallback))
			.ok_or_else(|| anyhow!("failed to load fallback locale bundle"))?;

		bundle.get_message(key).map_or_else(
			|| Err(anyhow!("unknown fluent key `{}`", key)),
			|message| {
				message.value().map_or_else(
					|| Err(anyhow!("message `{}` has no value", key)),
					|pattern| Ok(Self::format(bundle, pattern, args)),
				)
			},
		)
	}

	/// Apply translations to the given command tree
	pub(crate) fn apply_translations_to_interactions(
		&self,
		commands: &mut [Command],
		parent_name: Option<&String>,
	) {
		for command in &mut *commands {
			// Skip prefix only commands
			if command.slash_action.is_none() && command.subcommands.is_empty() {
				continue;
			}

			self.apply_translations_to_interaction(command, parent_name.cloned());
		}
	}

	/// Apply translations to the given group or command
	pub(crate) fn apply_translations_to_interaction(
		&self,
		command: &mut Command,
		parent_name: Option<String>,
	) {
		let full_command_name = match parent_name {
			Some(parent_name) => format!("{}_{}", parent_name, command.name),
			None => command.name.clone(),
		};

		for (locale, bundle) in &self.bundles {
			let Some(command_translation) = bundle.get_message(&full_command_name) else {
				tracing::error!(
					"translation for command `{}` with locale `{}` does not exist",
					full_command_name,
					locale
				);

				continue;
			};

			match command_translation.value() {
				Some(name) => {
					command
						.name_localizations
						.insert(locale.to_string(), Self::format(bundle, name, None).into());
				}
				None => {
					tracing::error!(
						"translation for command `{}` with locale `{}` does not have a name",
						full_command_name,
						locale
					);
				}
			}

			Self::apply_translations_to_slash_command(
				locale,
				bundle,
				&command_translation,
				command,
				&full_command_name,
			);
		}

		self.apply_translations_to_interactions(&mut command.subcommands, Some(&full_command_name));
	}

	/// Apply translations to the given slash command
	fn apply_translations_to_slash_command(
		locale: &LanguageIdentifier,
		bundle: &FluentBundle,
		command_translation: &FluentMessage,
		command: &mut Command,
		full_command_name: &String,
	) {
		let apply_attribute =
			|attribute: &str, hash_map: &mut HashMap<String, String>, description: &str| {
				command_translation.get_attribute(attribute).map_or_else(
					|| {
						tracing::error!(
							"translation for command `{}` with locale `{}` does not have a {}",
							full_command_name,
							locale,
							description
						);
					},
					|description| {
						hash_map.insert(
							locale.to_string(),
							Self::format(bundle, description.value(), None).into(),
						);
					},
				);
			};

		apply_attribute(
			"description",
			&mut command.description_localizations,
			"description",
		);

		for parameter in &mut command.parameters {
			apply_attribute(
				&parameter.name,
				&mut parameter.name_localizations,
				format!("name for the parameter `{}`", parameter.name).as_str(),
			);

			apply_attribute(
				&format!("{}-description", parameter.name),
				&mut parameter.description_localizations,
				&format!("description for the parameter `{}`", parameter.name),
			);
		}
	}
}

/// Trait for client internationalisation
pub(crate) trait Translate {
	/// Get the translation for the given message with a locale provided by self context
	fn translate_checked<'bundle>(
		&'bundle self,
		key: &'bundle str,
		args: Option<&'bundle FluentArgs>,
	) -> anyhow::Result<Cow<'bundle, str>>;

	/// Get a translated key of the key itself in case it is not found
	fn translate<'b>(&'b self, key: &'b str, args: Option<FluentArgs<'b>>) -> String {
		match self.translate_checked(key, args.as_ref()) {
			Ok(string) => string.into_owned(),
			Err(error) => {
				tracing::error!(key = key, args = ?args, error = ?error, "translation error");
				key.to_owned()
			}
		}
	}
}

/// Translations bound to the locale of a reply
#[derive(Debug)]
pub(crate) struct Localized<'a> {
	/// Every loaded translation
	translations: &'a Translations,
	/// The locale replies are written in
	pub(crate) locale: LanguageIdentifier,
}

impl<'a> Localized<'a> {
	/// Bind `translations` to `locale`
	pub(crate) const fn new(translations: &'a Translations, locale: LanguageIdentifier) -> Self {
		Self {
			translations,
			locale,
		}
	}
}

impl Translate for Localized<'_> {
	fn translate_checked<'bundle>(
		&'bundle self,
		key: &'bundle str,
		args: Option<&'bundle FluentArgs>,
	) -> anyhow::Result<Cow<'bundle, str>> {
		self.translations
			.translate_checked(&self.locale, key, args)
	}
}

/// Read a stored language, failures are logged and treated as unset
///
/// Languages are keyed per user, so they expire like any other read instead of
/// staying cached for every caller the bot ever saw.
async fn stored_language<S: DocumentStore>(database: &CachedStore<S>, path: &str) -> Option<String> {
	match database
		.get_as_with::<Option<String>>(path, None, Expiry::Idle)
		.await
	{
		Ok(language) => language,
		Err(error) => {
			tracing::error!(path, error = ?error, "failed to read stored language");
			None
		}
	}
}

/// Resolve the locale replies to this context should use
pub(crate) async fn localize(ctx: Context<'_>) -> Localized<'_> {
	let data = ctx.data();
	let translations = &data.translations;

	let user_language =
		stored_language(&data.database, &paths::user_language(ctx.author().id.get())).await;
	let guild_language = match ctx.guild_id() {
		Some(guild_id) => {
			stored_language(&data.database, &paths::guild_language(guild_id.get())).await
		}
		None => None,
	};

	let locale = translations.pick([
		user_language,
		guild_language,
		ctx.locale().map(ToOwned::to_owned),
	]);

	Localized::new(translations, locale)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::database::MemoryStore;
	use fluent::fluent_args;
	use fluent_syntax::{ast::Entry, parser};
	use std::{collections::BTreeSet, time::Duration};
	use unic_langid::langid;

	const EN: &str = "hello = Hello { $name }!\nbye = Goodbye\n";
	const TR: &str = "hello = Merhaba { $name }!\n";

	fn translations() -> Translations {
		Translations::from_sources(&[("en-US", EN), ("tr", TR)], langid!("en-US")).unwrap()
	}

	#[test]
	fn requires_the_fallback_bundle() {
		assert!(Translations::from_sources(&[("tr", TR)], langid!("en-US")).is_err());
	}

	#[test]
	fn translates_with_arguments() {
		let translations = translations();
		let turkish = Localized::new(&translations, langid!("tr"));

		assert_eq!(
			turkish.translate("hello", Some(fluent_args!["name" => "Clutter"])),
			"Merhaba \u{2068}Clutter\u{2069}!"
		);
	}

	#[test]
	fn unknown_keys_render_as_themselves() {
		let translations = translations();
		let english = Localized::new(&translations, langid!("en-US"));

		assert_eq!(english.translate("missing-key", None), "missing-key");
		// Keys missing from a locale are not taken from the fallback
		assert_eq!(
			Localized::new(&translations, langid!("tr")).translate("bye", None),
			"bye"
		);
	}

	#[test]
	fn unknown_locales_use_the_fallback_bundle() {
		let translations = translations();
		let german = Localized::new(&translations, langid!("de"));

		assert_eq!(german.translate("bye", None), "Goodbye");
	}

	#[test]
	fn picks_the_first_available_locale() {
		let translations = translations();

		assert_eq!(
			translations.pick([None, Some("tr"), Some("en-US")]),
			langid!("tr")
		);
		assert_eq!(
			translations.pick([Some("de"), Some("not a locale"), None]),
			langid!("en-US")
		);
		assert_eq!(translations.pick::<_, &str>([]), langid!("en-US"));
	}

	#[test]
	fn lists_locales() {
		assert_eq!(translations().locales(), vec!["en-US", "tr"]);
		assert_eq!(translations().available("tr"), Some(langid!("tr")));
		assert_eq!(translations().available("de"), None);
	}

	fn message_ids(path: &str) -> BTreeSet<String> {
		let source = read_to_string(path).unwrap();
		let resource = parser::parse(source.as_str()).unwrap();

		resource
			.body
			.iter()
			.filter_map(|entry| match entry {
				Entry::Message(message) => Some(message.id.name.to_owned()),
				_ => None,
			})
			.collect()
	}

	#[tokio::test(start_paused = true)]
	async fn stored_languages_leave_the_cache_when_unused() {
		let database = CachedStore::new(MemoryStore::default(), Duration::from_secs(60));
		database
			.set(&paths::user_language(1), "tr".into())
			.await
			.unwrap();

		assert_eq!(
			stored_language(&database, &paths::user_language(1)).await,
			Some("tr".to_owned())
		);
		for user_id in 2..500 {
			assert_eq!(stored_language(&database, &paths::user_language(user_id)).await, None);
		}
		assert_eq!(database.len(), 499);

		tokio::time::sleep(Duration::from_secs(61)).await;
		for _ in 0..4 {
			tokio::task::yield_now().await;
		}

		assert_eq!(database.len(), 0);
	}

	#[test]
	fn shipped_locales_define_the_same_messages() {
		let translations = Translations::from_folder("translations", langid!("en-US")).unwrap();
		assert_eq!(translations.locales(), vec!["en-US", "tr"]);

		assert_eq!(
			message_ids("translations/en-US.ftl"),
			message_ids("translations/tr.ftl")
		);
	}
}
