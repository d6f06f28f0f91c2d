//! Read-through cache in front of a [`DocumentStore`]

use super::{path, DocumentPath, DocumentStore, Error, Target};
use async_trait::async_trait;
use mongodb::bson::Bson;
use std::{
	collections::HashMap,
	fmt,
	sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
	time::Duration,
};
use tokio::{
	task::AbortHandle,
	time::{sleep_until, Instant},
};

/// How long a cached read is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
	/// Evicted after staying unused for the cache cooldown
	Idle,
	/// Kept until a write touches it
	Never,
}

/// A cached read
struct Entry {
	/// The stored value, `None` when the store confirmed it is absent
	value: Option<Bson>,
	/// Last time the entry was read
	last_access: Instant,
	/// Eviction policy of the entry
	expiry: Expiry,
	/// Distinguishes this entry from earlier entries under the same key
	generation: u64,
	/// The idle expiry task watching this entry
	timer: Option<AbortHandle>,
}

impl Entry {
	/// Stop watching the entry for idleness
	fn disarm(&mut self) {
		if let Some(timer) = self.timer.take() {
			timer.abort();
		}
	}
}

/// Cache state shared with the expiry tasks
#[derive(Default)]
struct State {
	/// Cached reads keyed by normalized path
	entries: HashMap<String, Entry>,
	/// Source of entry generations
	next_generation: u64,
	/// Number of invalidations so far
	///
	/// A read that saw this change while it was fetching must not be cached.
	invalidations: u64,
}

impl Drop for State {
	fn drop(&mut self) {
		for entry in self.entries.values_mut() {
			entry.disarm();
		}
	}
}

/// Lock the cache state, the state stays consistent even if a holder panicked
fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
	state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wait until the entry has been idle for `cooldown`, then evict it
///
/// Reads arriving while the task sleeps push the deadline further.
async fn expire(state: Weak<Mutex<State>>, key: String, generation: u64, cooldown: Duration) {
	let mut deadline = Instant::now() + cooldown;

	loop {
		sleep_until(deadline).await;

		let Some(state) = state.upgrade() else {
			return;
		};
		let mut state = lock(&state);

		let Some(entry) = state.entries.get(&key) else {
			return;
		};

		if entry.generation != generation || entry.expiry == Expiry::Never {
			return;
		}

		let idle_until = entry.last_access + cooldown;

		if idle_until <= Instant::now() {
			state.entries.remove(&key);
			tracing::debug!(path = key, "evicted idle cache entry");

			return;
		}

		deadline = idle_until;
	}
}

/// Caches reads of an inner [`DocumentStore`] and invalidates them on writes
///
/// Every write removes the cached paths it may have changed: the written path, the
/// paths below it and the paths above it. Writing `guilds.1.prefix` drops a cached
/// `guilds.1` document as well as a cached `guilds.1.prefix.value`.
pub(crate) struct CachedStore<S> {
	/// The backing store
	store: S,
	/// Time after which an unused entry is evicted
	cooldown: Duration,
	/// Cached entries
	state: Arc<Mutex<State>>,
}

impl<S: fmt::Debug> fmt::Debug for CachedStore<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CachedStore")
			.field("store", &self.store)
			.field("cooldown", &self.cooldown)
			.field("entries", &lock(&self.state).entries.len())
			.finish()
	}
}

impl<S: DocumentStore> CachedStore<S> {
	/// Wrap `store`, evicting entries unused for `cooldown`
	pub(crate) fn new(store: S, cooldown: Duration) -> Self {
		Self {
			store,
			cooldown,
			state: Arc::default(),
		}
	}

	/// Number of cached entries
	pub(crate) fn len(&self) -> usize {
		lock(&self.state).entries.len()
	}

	/// Whether a read of `path` is currently cached
	#[cfg(test)]
	pub(crate) fn contains(&self, path: &str) -> bool {
		DocumentPath::parse(path)
			.is_ok_and(|path| lock(&self.state).entries.contains_key(&path.to_string()))
	}

	/// Fetch the value at `path`, keeping it cached according to `expiry`
	pub(crate) async fn get_with(&self, path: &str, expiry: Expiry) -> Result<Option<Bson>, Error> {
		let key = DocumentPath::parse(path)?.to_string();

		let invalidations = {
			let mut state = lock(&self.state);

			if let Some(entry) = state.entries.get_mut(&key) {
				entry.last_access = Instant::now();

				if expiry == Expiry::Never {
					entry.expiry = Expiry::Never;
					entry.disarm();
				}

				tracing::trace!(path = key, "cache hit");
				return Ok(entry.value.clone());
			}

			state.invalidations
		};

		tracing::debug!(path = key, "cache miss");
		let value = self.store.get(&key).await?;

		let mut state = lock(&self.state);

		// A write landed while fetching, the value may already be stale
		if state.invalidations != invalidations {
			return Ok(value);
		}

		state.next_generation += 1;
		let generation = state.next_generation;

		let timer = (expiry == Expiry::Idle).then(|| {
			tokio::spawn(expire(
				Arc::downgrade(&self.state),
				key.clone(),
				generation,
				self.cooldown,
			))
			.abort_handle()
		});

		let previous = state.entries.insert(
			key,
			Entry {
				value: value.clone(),
				last_access: Instant::now(),
				expiry,
				generation,
				timer,
			},
		);

		if let Some(mut previous) = previous {
			previous.disarm();
		}

		Ok(value)
	}

	/// Fetch and deserialize the value at `path` or `default`, keeping it cached according to `expiry`
	pub(crate) async fn get_as_with<T>(&self, path: &str, default: T, expiry: Expiry) -> Result<T, Error>
	where
		T: serde::de::DeserializeOwned,
	{
		super::decode(self.get_with(path, expiry).await?, default)
	}

	/// Drop every cached entry overlapping the normalized `path`
	fn invalidate(&self, path: &str) {
		let mut state = lock(&self.state);
		state.invalidations += 1;

		let before = state.entries.len();
		state.entries.retain(|key, entry| {
			if path::overlaps(key, path) {
				entry.disarm();
				false
			} else {
				true
			}
		});

		tracing::debug!(
			path,
			invalidated = before - state.entries.len(),
			"invalidated cache entries"
		);
	}
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for CachedStore<S> {
	async fn get(&self, path: &str) -> Result<Option<Bson>, Error> {
		self.get_with(path, Expiry::Idle).await
	}

	async fn set(&self, path: &str, value: Bson) -> Result<(), Error> {
		let key = DocumentPath::parse(path)?.to_string();

		let result = self.store.set(path, value).await;
		self.invalidate(&key);

		result
	}

	async fn push(&self, path: &str, value: Bson, allow_duplicates: bool) -> Result<bool, Error> {
		let key = DocumentPath::parse_field(path)?.to_string();

		let result = self.store.push(path, value, allow_duplicates).await;
		self.invalidate(&key);

		result
	}

	async fn pull(&self, path: &str, value: Bson) -> Result<bool, Error> {
		let key = DocumentPath::parse_field(path)?.to_string();

		let result = self.store.pull(path, value).await;
		self.invalidate(&key);

		result
	}

	async fn remove(&self, path: &str) -> Result<(), Error> {
		let key = Target::parse(path)?.to_string();

		let result = self.store.remove(path).await;
		self.invalidate(&key);

		result
	}

	async fn ping(&self) -> Result<Duration, Error> {
		self.store.ping().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::database::MemoryStore;
	use mongodb::bson::doc;
	use tokio::time::sleep;

	const COOLDOWN: Duration = Duration::from_secs(60);

	fn cached() -> CachedStore<MemoryStore> {
		CachedStore::new(MemoryStore::default(), COOLDOWN)
	}

	/// Let the paused clock run for `duration` and give expiry tasks a chance to run
	async fn elapse(duration: Duration) {
		sleep(duration).await;

		for _ in 0..4 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test(start_paused = true)]
	async fn repeated_reads_hit_the_cache() {
		let db = cached();
		db.set("guilds.1.prefix", "!".into()).await.unwrap();

		assert_eq!(db.get("guilds.1.prefix").await.unwrap(), Some("!".into()));
		assert_eq!(db.get("guilds.1.prefix").await.unwrap(), Some("!".into()));
		assert_eq!(db.get("guilds..1.prefix").await.unwrap(), Some("!".into()));

		assert_eq!(db.store.get_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn absence_is_cached() {
		let db = cached();

		assert_eq!(
			db.get_or("guilds.999.prefix", ">".into()).await.unwrap(),
			Bson::String(">".into())
		);
		assert_eq!(
			db.get_or("guilds.999.prefix", "?".into()).await.unwrap(),
			Bson::String("?".into())
		);

		assert_eq!(db.store.get_calls(), 1);
		assert!(db.contains("guilds.999.prefix"));
	}

	#[tokio::test(start_paused = true)]
	async fn writes_invalidate_the_written_path() {
		let db = cached();
		db.set("guilds.1.prefix", "!".into()).await.unwrap();
		db.get("guilds.1.prefix").await.unwrap();

		db.set("guilds.1.prefix", "?".into()).await.unwrap();

		assert!(!db.contains("guilds.1.prefix"));
		assert_eq!(db.get("guilds.1.prefix").await.unwrap(), Some("?".into()));
		assert_eq!(db.store.get_calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn writes_invalidate_parents_and_children() {
		let db = cached();
		db.set("guilds.1.prefix", "!".into()).await.unwrap();
		db.set("guilds.10.prefix", "!".into()).await.unwrap();

		db.get("guilds.1").await.unwrap();
		db.get("guilds.1.prefix").await.unwrap();
		db.get("guilds.10.prefix").await.unwrap();
		db.get("guilds.1.language").await.unwrap();

		db.set("guilds.1.prefix", "?".into()).await.unwrap();

		assert!(!db.contains("guilds.1"));
		assert!(!db.contains("guilds.1.prefix"));
		assert!(db.contains("guilds.10.prefix"));
		assert!(db.contains("guilds.1.language"));

		assert_eq!(
			db.get("guilds.1").await.unwrap(),
			Some(Bson::Document(doc! { "prefix": "?" }))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn remove_cascades_to_fields() {
		let db = cached();
		db.set("guilds.1.prefix", "!".into()).await.unwrap();
		db.get("guilds.1.prefix").await.unwrap();

		db.remove("guilds.1").await.unwrap();

		assert_eq!(
			db.get_or("guilds.1.prefix", ">".into()).await.unwrap(),
			Bson::String(">".into())
		);

		db.get("guilds.2.prefix").await.unwrap();
		db.remove("guilds").await.unwrap();
		assert_eq!(db.len(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn push_and_pull_invalidate() {
		let db = cached();

		assert_eq!(db.get("guilds.42.mods").await.unwrap(), None);

		assert!(db.push("guilds.42.mods", 7.into(), false).await.unwrap());
		assert_eq!(
			db.get("guilds.42.mods").await.unwrap(),
			Some(Bson::Array(vec![7.into()]))
		);

		assert!(db.pull("guilds.42.mods", 7.into()).await.unwrap());
		assert_eq!(
			db.get("guilds.42.mods").await.unwrap(),
			Some(Bson::Array(Vec::new()))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn idle_entries_expire() {
		let db = cached();
		db.get("guilds.1.prefix").await.unwrap();
		assert!(db.contains("guilds.1.prefix"));

		elapse(COOLDOWN + Duration::from_secs(1)).await;

		assert!(!db.contains("guilds.1.prefix"));
		assert_eq!(db.len(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn reads_postpone_expiry() {
		let db = cached();
		db.get("guilds.1.prefix").await.unwrap();

		elapse(COOLDOWN / 2).await;
		db.get("guilds.1.prefix").await.unwrap();

		// Past the first deadline, but touched half a cooldown ago
		elapse(COOLDOWN / 2 + Duration::from_secs(1)).await;
		assert!(db.contains("guilds.1.prefix"));

		elapse(COOLDOWN / 2).await;
		assert!(!db.contains("guilds.1.prefix"));

		assert_eq!(db.store.get_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn entries_cached_forever_survive_the_cooldown() {
		let db = cached();
		db.set("guilds.1.prefix", "!".into()).await.unwrap();

		db.get_with("guilds.1.prefix", Expiry::Never).await.unwrap();
		elapse(COOLDOWN * 3).await;

		assert!(db.contains("guilds.1.prefix"));

		db.set("guilds.1.prefix", "?".into()).await.unwrap();
		assert!(!db.contains("guilds.1.prefix"));
		assert_eq!(
			db.get_as_with("guilds.1.prefix", ">".to_owned(), Expiry::Never)
				.await
				.unwrap(),
			"?"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn reading_forever_promotes_idle_entries() {
		let db = cached();
		db.get("guilds.1.prefix").await.unwrap();
		db.get_with("guilds.1.prefix", Expiry::Never).await.unwrap();

		elapse(COOLDOWN * 2).await;

		assert!(db.contains("guilds.1.prefix"));
	}

	#[tokio::test(start_paused = true)]
	async fn invalid_paths_fail_before_reaching_the_store() {
		let db = cached();

		assert!(matches!(
			db.get("guilds").await,
			Err(Error::InvalidPath { .. })
		));
		assert!(matches!(
			db.push("guilds.1", 1.into(), true).await,
			Err(Error::InvalidPath { .. })
		));
		assert!(matches!(
			db.remove("").await,
			Err(Error::InvalidPath { .. })
		));

		assert_eq!(db.store.get_calls(), 0);
		assert_eq!(db.store.write_calls(), 0);
	}

	/// Wraps a [`MemoryStore`], returning reads after a delay and failing writes on request
	#[derive(Debug, Default)]
	struct SpyStore {
		/// Where values actually live
		inner: MemoryStore,
		/// Time between reading a value and returning it
		read_delay: Duration,
		/// Whether writes report an error after being applied
		fail_writes: bool,
	}

	impl SpyStore {
		/// Apply a write then fail if asked to
		fn written<T>(&self, path: &str, result: Result<T, Error>) -> Result<T, Error> {
			if self.fail_writes {
				return Err(Error::InvalidValue {
					path: path.to_owned(),
					reason: "connection lost after the write",
				});
			}

			result
		}
	}

	#[async_trait]
	impl DocumentStore for SpyStore {
		async fn get(&self, path: &str) -> Result<Option<Bson>, Error> {
			let value = self.inner.get(path).await;
			sleep(self.read_delay).await;

			value
		}

		async fn set(&self, path: &str, value: Bson) -> Result<(), Error> {
			self.written(path, self.inner.set(path, value).await)
		}

		async fn push(&self, path: &str, value: Bson, allow_duplicates: bool) -> Result<bool, Error> {
			self.written(path, self.inner.push(path, value, allow_duplicates).await)
		}

		async fn pull(&self, path: &str, value: Bson) -> Result<bool, Error> {
			self.written(path, self.inner.pull(path, value).await)
		}

		async fn remove(&self, path: &str) -> Result<(), Error> {
			self.written(path, self.inner.remove(path).await)
		}

		async fn ping(&self) -> Result<Duration, Error> {
			self.inner.ping().await
		}
	}

	#[tokio::test(start_paused = true)]
	async fn reads_racing_a_write_are_not_cached() {
		let db = CachedStore::new(
			SpyStore {
				read_delay: Duration::from_secs(1),
				..SpyStore::default()
			},
			COOLDOWN,
		);
		db.set("guilds.1.prefix", "!".into()).await.unwrap();

		let (read, ()) = tokio::join!(db.get("guilds.1.prefix"), async {
			sleep(Duration::from_millis(10)).await;
			db.set("guilds.1.prefix", "?".into()).await.unwrap();
		});

		// The read saw the value from before the write
		assert_eq!(read.unwrap(), Some("!".into()));
		assert!(!db.contains("guilds.1.prefix"));

		assert_eq!(db.get("guilds.1.prefix").await.unwrap(), Some("?".into()));
		assert!(db.contains("guilds.1.prefix"));
	}

	#[tokio::test(start_paused = true)]
	async fn failed_writes_still_invalidate() {
		let db = CachedStore::new(SpyStore::default(), COOLDOWN);
		db.set("guilds.1.prefix", "!".into()).await.unwrap();
		db.push("guilds.1.mods", 7.into(), true).await.unwrap();

		db.get("guilds.1.prefix").await.unwrap();
		db.get("guilds.1.mods").await.unwrap();
		assert_eq!(db.len(), 2);

		let db = CachedStore {
			store: SpyStore {
				fail_writes: true,
				..db.store
			},
			..db
		};

		assert!(db.set("guilds.1.prefix", "?".into()).await.is_err());
		assert!(!db.contains("guilds.1.prefix"));
		assert!(db.pull("guilds.1.mods", 7.into()).await.is_err());
		assert!(!db.contains("guilds.1.mods"));

		// The write landed before the error was reported
		assert_eq!(
			db.store.inner.get("guilds.1.prefix").await.unwrap(),
			Some("?".into())
		);
		assert_eq!(db.get("guilds.1.prefix").await.unwrap(), Some("?".into()));
	}

	#[test]
	fn debug_reports_the_cache_size() {
		let db = CachedStore {
			store: "backend",
			cooldown: COOLDOWN,
			state: Arc::default(),
		};

		assert_eq!(
			format!("{db:?}"),
			"CachedStore { store: \"backend\", cooldown: 60s, entries: 0 }"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn end_to_end() {
		let db = cached();

		db.set("guilds.42.prefix", "!".into()).await.unwrap();
		assert_eq!(db.get("guilds.42.prefix").await.unwrap(), Some("!".into()));

		db.push("guilds.42.mods", 7.into(), true).await.unwrap();
		assert_eq!(
			db.get("guilds.42.mods").await.unwrap(),
			Some(Bson::Array(vec![7.into()]))
		);

		db.pull("guilds.42.mods", 7.into()).await.unwrap();
		assert_eq!(
			db.get_as::<Vec<i32>>("guilds.42.mods", Vec::new())
				.await
				.unwrap(),
			Vec::<i32>::new()
		);

		db.remove("guilds.42").await.unwrap();
		assert_eq!(
			db.get_as("guilds.42.prefix", ">".to_owned()).await.unwrap(),
			">"
		);
	}
}
