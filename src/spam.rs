//! Per user command rate limiting
//!
//! Every user gets a keyed `governor` bucket. Overflowing it is a strike, several strikes
//! get the user blacklisted. Strikes are cleared by a successful command and forgotten
//! once a full window passes without a new one, so only sustained spam adds up to a
//! blacklist. Reaching the limit clears them too.

use governor::{
	clock::{Clock, DefaultClock, Reference},
	middleware::NoOpMiddleware,
	state::keyed::DefaultKeyedStateStore,
	Quota, RateLimiter,
};
use std::{collections::HashMap, num::NonZeroU32, time::Duration};

/// Tracked users before stale state is swept, at most once per window
const SWEEP_THRESHOLD: usize = 1024;

/// The keyed limiter, one bucket per user id
type UserRateLimiter<C> =
	RateLimiter<u64, DefaultKeyedStateStore<u64>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Outcome of a command attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
	/// The command may run
	Allowed,
	/// The bucket is empty, the user must wait
	Cooldown {
		/// Time until the next command is allowed
		retry_after: Duration,
	},
	/// The user kept spamming and must be blacklisted
	Blacklist,
}

/// Overflows of one user
#[derive(Debug)]
struct Strikes<I> {
	/// Overflows since the last allowed command
	count: u32,
	/// When the last overflow happened
	last: I,
}

/// Tracks command usage of every user
pub(crate) struct SpamControl<C: Clock = DefaultClock> {
	/// Buckets of every user
	limiter: UserRateLimiter<C>,
	/// Clock shared with the limiter
	clock: C,
	/// Length of a full window
	per: Duration,
	/// Strikes leading to a blacklist
	max_strikes: u32,
	/// Strikes per user id
	strikes: HashMap<u64, Strikes<C::Instant>>,
	/// When stale state was last swept
	last_sweep: C::Instant,
}

impl SpamControl {
	/// Allow `rate` commands every `per`, blacklisting after `max_strikes` overflows
	pub(crate) fn new(rate: u32, per: Duration, max_strikes: u32) -> Self {
		Self::with_clock(rate, per, max_strikes, DefaultClock::default())
	}
}

impl<C: Clock + Clone> SpamControl<C> {
	/// Same as [`SpamControl::new`] reading time from `clock`
	pub(crate) fn with_clock(rate: u32, per: Duration, max_strikes: u32, clock: C) -> Self {
		let burst = NonZeroU32::new(rate).unwrap_or(NonZeroU32::MIN);
		let quota = Quota::with_period(per / burst.get())
			.map_or_else(|| Quota::per_second(burst), |quota| quota.allow_burst(burst));

		Self {
			limiter: RateLimiter::dashmap_with_clock(quota, clock.clone()),
			last_sweep: clock.now(),
			clock,
			per,
			max_strikes,
			strikes: HashMap::new(),
		}
	}

	/// Record a command attempt of `user_id`
	pub(crate) fn hit(&mut self, user_id: u64) -> Verdict {
		let now = self.clock.now();

		let crowded = self.strikes.len() > SWEEP_THRESHOLD || self.limiter.len() > SWEEP_THRESHOLD;
		if crowded && Duration::from(now.duration_since(self.last_sweep)) >= self.per {
			self.sweep(now);
		}

		let not_until = match self.limiter.check_key(&user_id) {
			Ok(()) => {
				self.strikes.remove(&user_id);

				return Verdict::Allowed;
			}
			Err(not_until) => not_until,
		};

		let strikes = self.strikes.entry(user_id).or_insert(Strikes {
			count: 0,
			last: now,
		});
		strikes.count += 1;
		strikes.last = now;

		if strikes.count >= self.max_strikes {
			self.strikes.remove(&user_id);

			return Verdict::Blacklist;
		}

		Verdict::Cooldown {
			retry_after: not_until.wait_time_from(now),
		}
	}

	/// Forget full buckets and strikes older than a window
	fn sweep(&mut self, now: C::Instant) {
		let per = self.per;
		self.last_sweep = now;

		self.limiter.retain_recent();
		self.limiter.shrink_to_fit();
		self.strikes
			.retain(|_, strikes| Duration::from(now.duration_since(strikes.last)) < per);

		tracing::debug!(
			limited = self.limiter.len(),
			striked = self.strikes.len(),
			"swept spam control state"
		);
	}
}
