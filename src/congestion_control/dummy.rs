// Copyright (c) 2024 The TQUIC Authors.
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

#![allow(unused_variables)]

use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use super::bandwidth;
use super::CongestionStats;
use super::SendAlgorithm;
use super::SendDelay;
use crate::connection::rtt::RttSource;

/// Dummy is a simple congestion controller with a static congestion window.
/// It is intended to be used for testing and experiments.
pub struct Dummy {
    /// Congestion window in bytes.
    cwnd: u64,

    /// RTT of the path.
    rtt: Rc<dyn RttSource>,

    /// Congestion statistics.
    stats: CongestionStats,
}

impl Dummy {
    pub fn new(initial_cwnd: u64, rtt: Rc<dyn RttSource>) -> Self {
        Self {
            cwnd: initial_cwnd,
            rtt,
            stats: Default::default(),
        }
    }
}

impl SendAlgorithm for Dummy {
    fn name(&self) -> &str {
        "DUMMY"
    }

    fn on_packet_sent(
        &mut self,
        sent_time: Instant,
        bytes_in_flight: u64,
        pkt_num: u64,
        bytes: u64,
        is_retransmittable: bool,
    ) -> bool {
        self.stats.packets_sent_in_total = self.stats.packets_sent_in_total.saturating_add(1);
        if !is_retransmittable {
            return false;
        }
        self.stats.bytes_in_flight = bytes_in_flight.saturating_add(bytes);
        self.stats.bytes_sent_in_total = self.stats.bytes_sent_in_total.saturating_add(bytes);
        true
    }

    fn on_packet_acked(&mut self, pkt_num: u64, acked_bytes: u64, prior_in_flight: u64) {
        self.stats.bytes_in_flight = prior_in_flight.saturating_sub(acked_bytes);
        self.stats.bytes_acked_in_total =
            self.stats.bytes_acked_in_total.saturating_add(acked_bytes);
    }

    fn on_packet_lost(&mut self, pkt_num: u64, lost_bytes: u64, prior_in_flight: u64) {
        self.stats.bytes_in_flight = prior_in_flight.saturating_sub(lost_bytes);
        self.stats.bytes_lost_in_total = self.stats.bytes_lost_in_total.saturating_add(lost_bytes);
    }

    fn congestion_window(&mut self, now: Instant) -> u64 {
        self.cwnd
    }

    fn time_until_send(&mut self, now: Instant, bytes_in_flight: u64) -> SendDelay {
        if self.cwnd > bytes_in_flight {
            SendDelay::Immediate
        } else {
            SendDelay::Blocked
        }
    }

    fn bandwidth_estimate(&mut self, now: Instant) -> u64 {
        bandwidth(self.cwnd, self.smoothed_rtt())
    }

    fn slow_start_threshold(&self) -> u64 {
        self.cwnd
    }

    fn reno_beta(&self) -> f32 {
        1.0
    }

    fn retransmission_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn smoothed_rtt(&self) -> Duration {
        self.rtt.smoothed_rtt()
    }

    fn initial_window(&self) -> u64 {
        self.cwnd
    }

    fn minimal_window(&self) -> u64 {
        self.cwnd
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn dummy_init() {
        let rtt = Rc::new(Cell::new(Duration::from_millis(100)));
        let mut d = Dummy::new(1200 * 10, rtt);
        let now = Instant::now();
        assert_eq!(d.name(), "DUMMY");
        assert_eq!(d.congestion_window(now), 1200 * 10);
        assert_eq!(d.initial_window(), 1200 * 10);
        assert_eq!(d.minimal_window(), 1200 * 10);

        assert_eq!(d.in_recovery(), false);
        assert_eq!(d.on_tick(now), false);
        assert_eq!(d.stats().bytes_in_flight, 0);
        assert_eq!(d.bandwidth_estimate(now), 120_000);

        // A huge window saturates instead of wrapping.
        let rtt = Rc::new(Cell::new(Duration::ZERO));
        let mut d = Dummy::new(u64::MAX, rtt);
        assert_eq!(d.bandwidth_estimate(now), u64::MAX);
    }

    #[test]
    fn dummy_stats() {
        let rtt = Rc::new(Cell::new(Duration::from_millis(100)));
        let mut d = Dummy::new(1200 * 10, rtt);
        let now = Instant::now();

        // Sent and acked a packet
        assert!(d.on_packet_sent(now, 0, 0, 1200, true));
        assert_eq!(d.stats().bytes_in_flight, 1200);
        assert_eq!(d.stats().bytes_sent_in_total, 1200);

        d.on_packet_acked(0, 1200, 1200);
        assert_eq!(d.stats().bytes_in_flight, 0);
        assert_eq!(d.stats().bytes_acked_in_total, 1200);

        // Sent and lost a packet
        assert!(d.on_packet_sent(now, 0, 1, 1400, true));
        assert_eq!(d.stats().bytes_in_flight, 1400);
        assert_eq!(d.stats().bytes_sent_in_total, 2600);

        d.on_packet_lost(1, 1400, 1400);
        assert_eq!(d.stats().bytes_in_flight, 0);
        assert_eq!(d.stats().bytes_lost_in_total, 1400);

        // Non retransmittable packets are not tracked.
        assert!(!d.on_packet_sent(now, 0, 2, 50, false));
        assert_eq!(d.stats().bytes_sent_in_total, 2600);
        assert_eq!(d.stats().packets_sent_in_total, 3);
    }

    #[test]
    fn dummy_time_until_send() {
        let rtt = Rc::new(Cell::new(Duration::from_millis(100)));
        let mut d = Dummy::new(1200 * 10, rtt);
        let now = Instant::now();
        assert_eq!(d.time_until_send(now, 0), SendDelay::Immediate);
        assert_eq!(d.time_until_send(now, 1200 * 10 - 1), SendDelay::Immediate);
        assert_eq!(d.time_until_send(now, 1200 * 10), SendDelay::Blocked);
    }
}
