// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Monitoring intervals and their rotating history.

use std::time::Duration;
use std::time::Instant;

/// Number of monitoring intervals kept by a history: the active one and the
/// three most recently completed ones.
pub const HISTORY_LEN: usize = 4;

/// One measurement epoch of a sending rate.
///
/// Counters only grow while the interval is active. Once the interval leaves
/// the active slot of the history nothing updates it anymore.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorInterval {
    /// Time the interval became active. `None` for intervals created before
    /// any traffic, which are always expired.
    start: Option<Instant>,

    /// Smoothed RTT sampled when the interval was created.
    duration: Duration,

    /// Target sending rate, in segments per interval.
    pub(super) rate: f64,

    /// Packets sent while active.
    sent_packets: u64,

    /// Packets acked while active.
    acked_packets: u64,

    /// Packets lost while active.
    lost_packets: u64,
}

impl MonitorInterval {
    pub fn new(duration: Duration, start: Option<Instant>) -> Self {
        Self {
            start,
            duration,
            rate: 0.0,
            sent_packets: 0,
            acked_packets: 0,
            lost_packets: 0,
        }
    }

    pub fn start(&self) -> Option<Instant> {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn sent_packets(&self) -> u64 {
        self.sent_packets
    }

    pub fn acked_packets(&self) -> u64 {
        self.acked_packets
    }

    pub fn lost_packets(&self) -> u64 {
        self.lost_packets
    }

    pub(super) fn on_sent(&mut self) {
        self.sent_packets = self.sent_packets.saturating_add(1);
    }

    pub(super) fn on_acked(&mut self) {
        self.acked_packets = self.acked_packets.saturating_add(1);
    }

    pub(super) fn on_lost(&mut self) {
        self.lost_packets = self.lost_packets.saturating_add(1);
    }

    /// Whether the interval has lasted its full duration at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.start {
            Some(start) => now.saturating_duration_since(start) >= self.duration,
            None => true,
        }
    }

    /// Fraction of the sent packets that were lost, zero if nothing was sent.
    pub fn loss_rate(&self) -> f64 {
        if self.sent_packets == 0 {
            return 0.0;
        }
        self.lost_packets as f64 / self.sent_packets as f64
    }
}

/// Fixed-size history of monitoring intervals, most recent first.
///
/// Slot 0 is the active interval; slots 1 to 3 are completed intervals. The
/// history always holds exactly `HISTORY_LEN` intervals.
#[derive(Debug, Clone)]
pub struct History {
    intervals: [MonitorInterval; HISTORY_LEN],
}

impl History {
    /// Create a history of not yet started intervals with the given rate.
    pub fn new(duration: Duration, rate: f64) -> Self {
        let mut interval = MonitorInterval::new(duration, None);
        interval.rate = rate;

        Self {
            intervals: std::array::from_fn(|_| interval.clone()),
        }
    }

    /// Number of intervals, always `HISTORY_LEN`.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// The interval currently accumulating counters.
    pub fn active(&self) -> &MonitorInterval {
        &self.intervals[0]
    }

    pub(super) fn active_mut(&mut self) -> &mut MonitorInterval {
        &mut self.intervals[0]
    }

    /// The most recently completed interval.
    pub fn last_completed(&self) -> &MonitorInterval {
        &self.intervals[1]
    }

    /// The interval completed before `last_completed()`.
    pub fn previous_completed(&self) -> &MonitorInterval {
        &self.intervals[2]
    }

    /// Return the interval in the given slot, 0 being the active one.
    pub fn get(&self, slot: usize) -> Option<&MonitorInterval> {
        self.intervals.get(slot)
    }

    /// Return an iterator over the intervals, most recent first.
    pub fn iter(&self) -> std::slice::Iter<MonitorInterval> {
        self.intervals.iter()
    }

    /// Freeze the active interval and make `next` the active one. The oldest
    /// interval is dropped.
    pub(super) fn rotate(&mut self, next: MonitorInterval) {
        self.intervals.rotate_right(1);
        self.intervals[0] = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_counters() {
        let now = Instant::now();
        let mut mi = MonitorInterval::new(Duration::from_millis(10), Some(now));
        assert_eq!(mi.rate(), 0.0);
        assert_eq!(mi.loss_rate(), 0.0);

        for _ in 0..4 {
            mi.on_sent();
        }
        mi.on_acked();
        mi.on_acked();
        mi.on_acked();
        mi.on_lost();
        assert_eq!(mi.sent_packets(), 4);
        assert_eq!(mi.acked_packets(), 3);
        assert_eq!(mi.lost_packets(), 1);
        assert_eq!(mi.loss_rate(), 0.25);
    }

    #[test]
    fn interval_counters_saturate() {
        let mut mi = MonitorInterval::new(Duration::from_millis(10), None);
        mi.sent_packets = u64::MAX;
        mi.lost_packets = u64::MAX;
        mi.on_sent();
        mi.on_lost();
        assert_eq!(mi.sent_packets(), u64::MAX);
        assert_eq!(mi.lost_packets(), u64::MAX);
        assert_eq!(mi.loss_rate(), 1.0);
    }

    #[test]
    fn interval_loss_rate_without_sent_packets() {
        let mut mi = MonitorInterval::new(Duration::from_millis(10), None);
        mi.on_lost();
        assert_eq!(mi.loss_rate(), 0.0);
    }

    #[test]
    fn interval_expiry() {
        let now = Instant::now();
        let rtt = Duration::from_millis(10);

        // Intervals that were never started are always expired.
        assert!(MonitorInterval::new(rtt, None).is_expired(now));

        let mi = MonitorInterval::new(rtt, Some(now));
        assert!(!mi.is_expired(now));
        assert!(!mi.is_expired(now + rtt - Duration::from_micros(1)));
        assert!(mi.is_expired(now + rtt));
        assert!(mi.is_expired(now + rtt * 100));
    }

    #[test]
    fn history_init() {
        let h = History::new(Duration::from_millis(20), 10.0);
        assert_eq!(h.len(), HISTORY_LEN);
        for mi in h.iter() {
            assert_eq!(mi.start(), None);
            assert_eq!(mi.duration(), Duration::from_millis(20));
            assert_eq!(mi.rate(), 10.0);
            assert_eq!(mi.sent_packets(), 0);
        }
        assert!(h.get(HISTORY_LEN).is_none());
    }

    #[test]
    fn history_rotation_is_a_right_shift() {
        let mut h = History::new(Duration::from_millis(20), 0.0);
        for (slot, mi) in h.intervals.iter_mut().enumerate() {
            mi.rate = slot as f64;
        }

        let now = Instant::now();
        let mut next = MonitorInterval::new(Duration::from_millis(30), Some(now));
        next.rate = 100.0;
        h.rotate(next);

        assert_eq!(h.len(), HISTORY_LEN);
        let rates: Vec<f64> = h.iter().map(|mi| mi.rate()).collect();
        assert_eq!(rates, vec![100.0, 0.0, 1.0, 2.0]);
        assert_eq!(h.active().start(), Some(now));
        assert_eq!(h.last_completed().rate(), 0.0);
        assert_eq!(h.previous_completed().rate(), 1.0);
    }

    #[test]
    fn history_keeps_frozen_counters() {
        let mut h = History::new(Duration::from_millis(20), 1.0);
        h.active_mut().on_sent();
        h.active_mut().on_sent();
        h.active_mut().on_lost();

        h.rotate(MonitorInterval::new(Duration::from_millis(20), None));
        h.active_mut().on_sent();

        assert_eq!(h.active().sent_packets(), 1);
        assert_eq!(h.last_completed().sent_packets(), 2);
        assert_eq!(h.last_completed().lost_packets(), 1);

        for _ in 0..10 {
            h.rotate(MonitorInterval::new(Duration::from_millis(20), None));
            assert_eq!(h.len(), HISTORY_LEN);
        }
        assert!(h.iter().all(|mi| mi.sent_packets() == 0));
    }
}
