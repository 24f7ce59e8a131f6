//! Exactly-once admission for retried chat-platform events.
//!
//! The platform retries deliveries freely and reuses the event id on each
//! retry, so a bounded, time-bounded id set in front of the handlers is
//! enough to make processing idempotent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use codebutler_core::clock::Clock;
use codebutler_core::config::DedupConfig;

pub struct EventDeduper {
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl EventDeduper {
    pub fn new(config: &DedupConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: Duration::seconds(config.ttl_secs as i64),
            max_entries: config.max_entries,
            clock,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically admit or reject an event id.
    ///
    /// Returns `true` exactly once per distinct id within a ttl window,
    /// across any number of concurrent callers. A rejected duplicate does
    /// not refresh the original timestamp.
    pub fn check(&self, event_id: &str) -> bool {
        let now = self.clock.now();
        let mut seen = self.seen.lock().unwrap();

        if let Some(inserted) = seen.get(event_id) {
            if now - *inserted < self.ttl {
                debug!(event_id, "duplicate event dropped");
                return false;
            }
        }

        // Capacity pressure: sweep expired entries before inserting. No LRU
        // beyond that; the ttl bounds growth under normal inbound rates.
        if seen.len() >= self.max_entries && !seen.contains_key(event_id) {
            let ttl = self.ttl;
            seen.retain(|_, inserted| now - *inserted < ttl);
        }

        seen.insert(event_id.to_string(), now);
        true
    }

    /// Drop every expired entry. Safe to skip: `check` stays correct
    /// without background sweeping; this only bounds idle memory.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut seen = self.seen.lock().unwrap();
        let before = seen.len();
        let ttl = self.ttl;
        seen.retain(|_, inserted| now - *inserted < ttl);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebutler_core::clock::{ManualClock, SystemClock};

    fn deduper_with_clock(clock: Arc<dyn Clock>) -> EventDeduper {
        EventDeduper::new(&DedupConfig::default(), clock)
    }

    #[test]
    fn first_check_accepts_second_rejects() {
        let dedup = deduper_with_clock(Arc::new(SystemClock));
        assert!(dedup.check("Ev1"));
        assert!(!dedup.check("Ev1"));
        assert!(dedup.check("Ev2"));
    }

    #[test]
    fn exactly_one_of_many_concurrent_checks_wins() {
        let dedup = Arc::new(deduper_with_clock(Arc::new(SystemClock)));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                std::thread::spawn(move || dedup.check("E1"))
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&accepted| accepted)
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn expired_id_is_accepted_again() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let dedup = deduper_with_clock(clock.clone());

        assert!(dedup.check("Ev1"));
        clock.advance(Duration::seconds(301));
        assert!(dedup.check("Ev1"));
    }

    #[test]
    fn capacity_pressure_sweeps_expired_entries() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = DedupConfig {
            ttl_secs: 300,
            max_entries: 3,
        };
        let dedup = EventDeduper::new(&config, clock.clone());

        assert!(dedup.check("a"));
        assert!(dedup.check("b"));
        assert!(dedup.check("c"));
        assert_eq!(dedup.len(), 3);

        // Everything above is now expired, so the sweep makes room.
        clock.advance(Duration::seconds(301));
        assert!(dedup.check("d"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn evict_expired_reports_removed_count() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let dedup = deduper_with_clock(clock.clone());

        dedup.check("a");
        dedup.check("b");
        clock.advance(Duration::seconds(301));
        dedup.check("c");

        assert_eq!(dedup.evict_expired(), 2);
        assert_eq!(dedup.len(), 1);
    }
}
