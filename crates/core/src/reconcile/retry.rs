//! Single-flight retry timers for pending updates.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct RetryTimer {
    due: Instant,
    attempts: u32,
}

/// One timer per pending id, fixed interval, capped attempts.
///
/// The schedule only tracks deadlines; whoever owns it decides when to look
/// at `due_ids` (the async driver sleeps until `next_deadline`).
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    interval: Duration,
    max_attempts: u32,
    timers: HashMap<String, RetryTimer>,
}

impl RetrySchedule {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            timers: HashMap::new(),
        }
    }

    /// Starts a timer for `id` unless one is already running.
    ///
    /// Returns `false` when a timer was already armed.
    pub fn arm(&mut self, id: &str) -> bool {
        if self.timers.contains_key(id) {
            return false;
        }
        self.timers.insert(
            id.to_string(),
            RetryTimer {
                due: Instant::now() + self.interval,
                attempts: 0,
            },
        );
        true
    }

    /// Pushes the deadline of a running timer one interval past `now`.
    pub fn rearm(&mut self, id: &str, now: Instant) {
        if let Some(timer) = self.timers.get_mut(id) {
            timer.due = now + self.interval;
        }
    }

    /// Counts an attempt for `id` and returns its 1-based number.
    ///
    /// `None` when the cap is already reached or no timer exists.
    pub fn begin_attempt(&mut self, id: &str) -> Option<u32> {
        let timer = self.timers.get_mut(id)?;
        if timer.attempts >= self.max_attempts {
            return None;
        }
        timer.attempts += 1;
        Some(timer.attempts)
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    pub fn cancel(&mut self, id: &str) -> bool {
        self.timers.remove(id).is_some()
    }

    pub fn is_armed(&self, id: &str) -> bool {
        self.timers.contains_key(id)
    }

    pub fn attempts(&self, id: &str) -> Option<u32> {
        self.timers.get(id).map(|timer| timer.attempts)
    }

    /// Ids whose deadline is at or before `now`, earliest first.
    pub fn due_ids(&self, now: Instant) -> Vec<String> {
        let mut due: Vec<(Instant, &String)> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.due <= now)
            .map(|(id, timer)| (timer.due, id))
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|timer| timer.due).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}
