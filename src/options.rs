//! Table configuration options.

use std::time::Duration;

/// Tunables shared by every table session.
///
/// Per-table stakes and seat limits live on [`crate::Table`] records; these
/// options cover the timers, lock TTL and wallet limits. Use the builder
/// pattern to customize them:
///
/// ```
/// use std::time::Duration;
/// use tonkrs::TableOptions;
///
/// let options = TableOptions::default()
///     .with_bot_think_time(Duration::from_millis(500))
///     .with_min_withdrawal(10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    /// Multiple of the stake a joining player must hold available.
    pub join_headroom: u64,
    /// TTL for the per-table store lock.
    pub lock_ttl: Duration,
    /// Delay between a round ending and the next round starting.
    pub round_transition_delay: Duration,
    /// Artificial think time before a bot acts.
    pub bot_think_time: Duration,
    /// Minimum amount a wallet withdrawal request may move.
    pub min_withdrawal: u64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            join_headroom: 4,
            lock_ttl: Duration::from_secs(10),
            round_transition_delay: Duration::from_secs(30),
            bot_think_time: Duration::from_secs(1),
            min_withdrawal: 5,
        }
    }
}

impl TableOptions {
    /// Sets the balance headroom multiple required to join.
    ///
    /// # Example
    ///
    /// ```
    /// use tonkrs::TableOptions;
    ///
    /// let options = TableOptions::default().with_join_headroom(6);
    /// assert_eq!(options.join_headroom, 6);
    /// ```
    #[must_use]
    pub const fn with_join_headroom(mut self, multiple: u64) -> Self {
        self.join_headroom = multiple;
        self
    }

    /// Sets the per-table lock TTL.
    #[must_use]
    pub const fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Sets the delay between rounds.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use tonkrs::TableOptions;
    ///
    /// let options = TableOptions::default()
    ///     .with_round_transition_delay(Duration::from_secs(5));
    /// assert_eq!(options.round_transition_delay, Duration::from_secs(5));
    /// ```
    #[must_use]
    pub const fn with_round_transition_delay(mut self, delay: Duration) -> Self {
        self.round_transition_delay = delay;
        self
    }

    /// Sets the artificial bot think time.
    #[must_use]
    pub const fn with_bot_think_time(mut self, think: Duration) -> Self {
        self.bot_think_time = think;
        self
    }

    /// Sets the minimum withdrawal amount.
    #[must_use]
    pub const fn with_min_withdrawal(mut self, min: u64) -> Self {
        self.min_withdrawal = min;
        self
    }
}
