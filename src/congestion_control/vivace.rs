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

//! PCC Vivace: Online-Learning Congestion Control.
//!
//! Vivace measures the outcome of its sending rate over monitoring intervals
//! of one smoothed RTT each. When an interval completes, the utility of the
//! last two completed intervals is added to the rate of the last one to get
//! the rate of the next interval. The congestion window is the rate of the
//! active interval scaled to bytes.
//!
//! This implementation keeps a single linear history of intervals and applies
//! the utility without step size normalization. It does not run the
//! randomized controlled trials of the paper.
//!
//! Interval expiry is checked lazily when the window is queried, or when
//! `on_tick()` is called. Callers must do one of them at least once per
//! smoothed RTT, otherwise the active interval keeps accumulating past its
//! nominal duration.
//!
//! See <https://www.usenix.org/conference/nsdi18/presentation/dong>.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use log::*;

use super::bandwidth;
use super::CongestionStats;
use super::History;
use super::MonitorInterval;
use super::RateReduction;
use super::SendAlgorithm;
use super::SendDelay;
use super::SlowStart;
use super::Utility;
use crate::connection::rtt::RttSource;
use crate::qlog::events::EventData;
use crate::qlog::QlogWriter;
use crate::TIMER_GRANULARITY;

/// Extra delay added to the retransmission timer.
const RETRANSMISSION_DELAY: Duration = Duration::from_millis(1);

/// Vivace configurable parameters.
#[derive(Debug, Clone)]
pub struct VivaceConfig {
    /// Minimal congestion window in bytes.
    min_cwnd: u64,

    /// Initial congestion window in bytes.
    initial_cwnd: u64,

    /// Maximal congestion window in bytes.
    max_cwnd: u64,

    /// Max datagram size in bytes.
    max_datagram_size: u64,

    /// Weight of the RTT gradient in the utility.
    latency_coefficient: f64,

    /// Exponent of the sub-linear throughput reward.
    throughput_exponent: f64,

    /// Enter a PRR recovery episode on loss.
    enable_prr_recovery: bool,
}

impl VivaceConfig {
    pub fn new(min_cwnd: u64, initial_cwnd: u64, max_cwnd: u64, max_datagram_size: u64) -> Self {
        let max_cwnd = max_cwnd.max(min_cwnd);
        Self {
            min_cwnd,
            initial_cwnd: initial_cwnd.min(max_cwnd).max(min_cwnd),
            max_cwnd,
            max_datagram_size: max_datagram_size.max(1),
            latency_coefficient: crate::DEFAULT_VIVACE_LATENCY_COEFFICIENT,
            throughput_exponent: crate::DEFAULT_VIVACE_THROUGHPUT_EXPONENT,
            enable_prr_recovery: false,
        }
    }

    /// Set the weight of the RTT gradient. Negative or non-finite values are
    /// ignored.
    pub fn set_latency_coefficient(&mut self, v: f64) {
        if v.is_finite() && v >= 0.0 {
            self.latency_coefficient = v;
        }
    }

    /// Set the throughput exponent. Only values in (0, 1] are accepted.
    pub fn set_throughput_exponent(&mut self, v: f64) {
        if v > 0.0 && v <= 1.0 {
            self.throughput_exponent = v;
        }
    }

    pub fn enable_prr_recovery(&mut self, v: bool) {
        self.enable_prr_recovery = v;
    }

    /// Lowest rate in segments per interval.
    fn min_rate(&self) -> f64 {
        self.min_cwnd as f64 / self.max_datagram_size as f64
    }

    /// Highest rate in segments per interval.
    fn max_rate(&self) -> f64 {
        self.max_cwnd as f64 / self.max_datagram_size as f64
    }
}

impl Default for VivaceConfig {
    fn default() -> Self {
        let mss = crate::DEFAULT_SEND_UDP_PAYLOAD_SIZE as u64;
        Self::new(
            crate::DEFAULT_MIN_CONGESTION_WINDOW * mss,
            crate::DEFAULT_INITIAL_CONGESTION_WINDOW * mss,
            crate::DEFAULT_MAX_CONGESTION_WINDOW * mss,
            mss,
        )
    }
}

/// Vivace rate controller for one path.
pub struct Vivace {
    /// Configurable parameters.
    config: VivaceConfig,

    /// Congestion statistics.
    stats: CongestionStats,

    /// Active and recently completed monitoring intervals.
    history: History,

    /// Source of the smoothed RTT, shared with the loss detection.
    rtt: Rc<dyn RttSource>,

    /// Slow start tracker, fed but never consulted for the window.
    slow_start: Box<dyn SlowStart>,

    /// Proportional rate reduction used in recovery episodes.
    prr: Box<dyn RateReduction>,

    /// Largest retransmittable packet number sent.
    largest_sent_pkt_num: Option<u64>,

    /// Largest packet number acked.
    largest_acked_pkt_num: Option<u64>,

    /// Largest packet number sent when the current recovery episode started.
    largest_sent_at_last_cutback: Option<u64>,

    /// Utility computed by the last rotation.
    last_utility: Option<Utility>,

    /// Optional trace output.
    qlog: Option<QlogWriter>,
}

impl Vivace {
    pub fn new(
        config: VivaceConfig,
        rtt: Rc<dyn RttSource>,
        slow_start: Box<dyn SlowStart>,
        prr: Box<dyn RateReduction>,
    ) -> Self {
        let duration = rtt.smoothed_rtt().max(TIMER_GRANULARITY);
        let rate = config.initial_cwnd as f64 / config.max_datagram_size as f64;

        Self {
            history: History::new(duration, rate),
            config,
            stats: Default::default(),
            rtt,
            slow_start,
            prr,
            largest_sent_pkt_num: None,
            largest_acked_pkt_num: None,
            largest_sent_at_last_cutback: None,
            last_utility: None,
            qlog: None,
        }
    }

    /// Monitoring intervals, the active one first.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Utility breakdown of the last completed interval.
    pub fn last_utility(&self) -> Option<&Utility> {
        self.last_utility.as_ref()
    }

    /// Attach a qlog writer and log the controller parameters.
    pub fn set_qlog(&mut self, mut qlog: QlogWriter, now: Instant) {
        // Writers may be started by the caller already.
        qlog.start().ok();
        let ev = EventData::RecoveryParametersSet {
            initial_rtt: Some(self.rtt.smoothed_rtt().as_secs_f32() * 1000.0),
            max_datagram_size: u32::try_from(self.config.max_datagram_size).ok(),
            initial_congestion_window: Some(self.config.initial_cwnd),
            minimum_congestion_window: Some(self.config.min_cwnd),
        };
        qlog.add_event_data(now, ev).ok();
        self.qlog = Some(qlog);
    }

    /// Duration of an interval created now.
    fn interval_duration(&self) -> Duration {
        self.rtt.smoothed_rtt().max(TIMER_GRANULARITY)
    }

    /// Apply the utility to the prior rate and keep the result in bounds.
    fn next_rate(&self, prior_rate: f64, utility: f64) -> f64 {
        let rate = prior_rate + utility;
        if !rate.is_finite() {
            return prior_rate;
        }
        rate.min(self.config.max_rate()).max(self.config.min_rate())
    }

    /// Congestion window of the active interval without checking expiry.
    fn current_window(&self) -> u64 {
        let cwnd = self.history.active().rate() * self.config.max_datagram_size as f64;
        (cwnd as u64)
            .min(self.config.max_cwnd)
            .max(self.config.min_cwnd)
    }

    fn on_rate_updated(&mut self, now: Instant, old_rate: f64, utility: Utility) {
        let cwnd = self.current_window();
        let qlog = match self.qlog.as_mut() {
            Some(qlog) => qlog,
            None => return,
        };

        let srtt = self.rtt.smoothed_rtt();
        let metrics = EventData::RecoveryMetricsUpdated {
            smoothed_rtt: Some(srtt.as_secs_f32() * 1000.0),
            congestion_window: Some(cwnd),
            bytes_in_flight: Some(self.stats.bytes_in_flight),
            ssthresh: None,
            pacing_rate: Some(bandwidth(cwnd, srtt)),
        };
        qlog.add_event_data(now, metrics).ok();

        let frozen = self.history.last_completed();
        let ev = EventData::RecoveryVivaceRateUpdated {
            old_rate,
            new_rate: self.history.active().rate(),
            interval: self.history.active().duration().as_secs_f32() * 1000.0,
            sent_packets: frozen.sent_packets(),
            acked_packets: frozen.acked_packets(),
            lost_packets: frozen.lost_packets(),
            utility,
        };
        qlog.add_event_data(now, ev).ok();
    }
}

impl SendAlgorithm for Vivace {
    fn name(&self) -> &str {
        "VIVACE"
    }

    fn on_packet_sent(
        &mut self,
        sent_time: Instant,
        bytes_in_flight: u64,
        pkt_num: u64,
        bytes: u64,
        is_retransmittable: bool,
    ) -> bool {
        self.history.active_mut().on_sent();
        self.stats.packets_sent_in_total = self.stats.packets_sent_in_total.saturating_add(1);
        if !is_retransmittable {
            return false;
        }

        if self.in_recovery() {
            self.prr.on_packet_sent(bytes);
        }
        self.largest_sent_pkt_num = Some(pkt_num);
        self.slow_start.on_packet_sent(pkt_num);

        self.stats.bytes_in_flight = bytes_in_flight.saturating_add(bytes);
        self.stats.bytes_sent_in_total = self.stats.bytes_sent_in_total.saturating_add(bytes);
        true
    }

    fn on_packet_acked(&mut self, pkt_num: u64, acked_bytes: u64, prior_in_flight: u64) {
        self.history.active_mut().on_acked();
        self.stats.bytes_in_flight = prior_in_flight.saturating_sub(acked_bytes);
        self.stats.bytes_acked_in_total =
            self.stats.bytes_acked_in_total.saturating_add(acked_bytes);

        self.largest_acked_pkt_num = Some(match self.largest_acked_pkt_num {
            Some(largest) => largest.max(pkt_num),
            None => pkt_num,
        });

        if self.in_recovery() {
            self.prr.on_packet_acked(acked_bytes);
        }

        self.slow_start
            .on_packet_acked(pkt_num, acked_bytes, self.rtt.smoothed_rtt());
        if self.slow_start.should_exit_slow_start() {
            trace!(
                "{}. slow start exit signaled at pkt_num={}",
                self.name(),
                pkt_num
            );
        }
    }

    fn on_packet_lost(&mut self, pkt_num: u64, lost_bytes: u64, prior_in_flight: u64) {
        self.history.active_mut().on_lost();
        self.stats.bytes_in_flight = prior_in_flight.saturating_sub(lost_bytes);
        self.stats.bytes_lost_in_total = self.stats.bytes_lost_in_total.saturating_add(lost_bytes);

        if !self.config.enable_prr_recovery {
            return;
        }

        // Losses of packets sent before the last cutback belong to the
        // current episode.
        if let Some(cutback) = self.largest_sent_at_last_cutback {
            if pkt_num <= cutback {
                return;
            }
        }

        self.largest_sent_at_last_cutback = Some(self.largest_sent_pkt_num.unwrap_or(pkt_num));
        self.prr.on_packet_lost(prior_in_flight);
        self.slow_start.on_congestion_event();
        self.stats.recovery_episodes = self.stats.recovery_episodes.saturating_add(1);
        trace!(
            "{}. enter recovery, pkt_num={} cutback={:?}",
            self.name(),
            pkt_num,
            self.largest_sent_at_last_cutback
        );
    }

    fn on_tick(&mut self, now: Instant) -> bool {
        if !self.history.active().is_expired(now) {
            return false;
        }

        // The active interval becomes the last completed one, and the last
        // completed one the previous.
        let utility = Utility::evaluate(
            self.history.active(),
            self.history.last_completed(),
            self.config.max_datagram_size,
            self.config.latency_coefficient,
            self.config.throughput_exponent,
        );
        let old_rate = self.history.active().rate();

        let mut next = MonitorInterval::new(self.interval_duration(), Some(now));
        next.rate = self.next_rate(old_rate, utility.value);
        self.history.rotate(next);

        self.last_utility = Some(utility);
        self.stats.intervals_completed = self.stats.intervals_completed.saturating_add(1);

        trace!(
            "{}. interval completed, utility={:.3} rate {:.3} -> {:.3}, duration={:?}",
            self.name(),
            utility.value,
            old_rate,
            self.history.active().rate(),
            self.history.active().duration()
        );

        self.on_rate_updated(now, old_rate, utility);
        true
    }

    fn congestion_window(&mut self, now: Instant) -> u64 {
        self.on_tick(now);
        self.current_window()
    }

    fn time_until_send(&mut self, now: Instant, bytes_in_flight: u64) -> SendDelay {
        let cwnd = self.congestion_window(now);
        if self.in_recovery() {
            return self
                .prr
                .time_until_send(cwnd, bytes_in_flight, self.slow_start_threshold());
        }

        if cwnd > bytes_in_flight {
            SendDelay::Immediate
        } else {
            SendDelay::Blocked
        }
    }

    fn bandwidth_estimate(&mut self, now: Instant) -> u64 {
        let cwnd = self.congestion_window(now);
        bandwidth(cwnd, self.interval_duration())
    }

    fn slow_start_threshold(&self) -> u64 {
        self.config.max_cwnd
    }

    fn in_recovery(&self) -> bool {
        match self.largest_sent_at_last_cutback {
            Some(cutback) => self.largest_acked_pkt_num.map_or(true, |acked| acked <= cutback),
            None => false,
        }
    }

    fn reno_beta(&self) -> f32 {
        0.0
    }

    fn retransmission_delay(&self) -> Duration {
        RETRANSMISSION_DELAY
    }

    fn on_retransmission_timeout(&mut self, packets_retransmitted: bool) {
        self.largest_sent_at_last_cutback = None;
        trace!(
            "{}. retransmission timeout, packets_retransmitted={}",
            self.name(),
            packets_retransmitted
        );
    }

    fn on_connection_migration(&mut self) {
        trace!("{}. connection migrated, rate kept", self.name());
    }

    fn set_num_emulated_connections(&mut self, num_connections: usize) {
        trace!(
            "{}. ignore num_emulated_connections={}",
            self.name(),
            num_connections
        );
    }

    fn set_slow_start_large_reduction(&mut self, enabled: bool) {
        trace!(
            "{}. ignore slow_start_large_reduction={}",
            self.name(),
            enabled
        );
    }

    fn smoothed_rtt(&self) -> Duration {
        self.rtt.smoothed_rtt()
    }

    fn initial_window(&self) -> u64 {
        self.config.initial_cwnd
    }

    fn minimal_window(&self) -> u64 {
        self.config.min_cwnd
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}

impl fmt::Debug for Vivace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vivace")
            .field("config", &self.config)
            .field("history", &self.history)
            .field("largest_sent_pkt_num", &self.largest_sent_pkt_num)
            .field("largest_acked_pkt_num", &self.largest_acked_pkt_num)
            .field(
                "largest_sent_at_last_cutback",
                &self.largest_sent_at_last_cutback,
            )
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
