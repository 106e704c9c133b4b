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

#![allow(unused_variables)]

use core::str::FromStr;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use crate::connection::rtt::RttSource;
use crate::Error;
use crate::RecoveryConfig;
use crate::Result;
use crate::TIMER_GRANULARITY;
pub use dummy::Dummy;
pub use hystart_plus_plus::HystartPlusPlus;
pub use monitor_interval::History;
pub use monitor_interval::MonitorInterval;
pub use monitor_interval::HISTORY_LEN;
pub use prr::PrrSender;
pub use utility::Utility;
pub use vivace::Vivace;
pub use vivace::VivaceConfig;

/// Available congestion control algorithm
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum CongestionControlAlgorithm {
    /// Vivace is an online-learning rate controller. It measures the outcome
    /// of its sending rate over RTT-long monitoring intervals and moves the
    /// rate along the gradient of a utility function that rewards throughput
    /// and penalizes RTT inflation and loss.
    #[default]
    Vivace,

    /// A static congestion window, intended for testing and experiments.
    Dummy,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        if algor.eq_ignore_ascii_case("vivace") {
            Ok(CongestionControlAlgorithm::Vivace)
        } else if algor.eq_ignore_ascii_case("dummy") {
            Ok(CongestionControlAlgorithm::Dummy)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// Result of asking a controller whether a packet may leave now.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SendDelay {
    /// The packet may be sent immediately.
    Immediate,

    /// Sending is blocked until the next ack or loss event changes the
    /// controller state.
    Blocked,
}

impl SendDelay {
    /// Whether the packet may be sent immediately.
    pub fn can_send(&self) -> bool {
        *self == SendDelay::Immediate
    }
}

/// Congestion control statistics.
#[derive(Debug, Default, Clone)]
pub struct CongestionStats {
    /// Bytes in flight.
    pub bytes_in_flight: u64,

    /// Total bytes sent.
    pub bytes_sent_in_total: u64,

    /// Total bytes acked.
    pub bytes_acked_in_total: u64,

    /// Total bytes lost.
    pub bytes_lost_in_total: u64,

    /// Total packets sent, retransmittable or not.
    pub packets_sent_in_total: u64,

    /// Number of completed monitoring intervals.
    pub intervals_completed: u64,

    /// Number of loss recovery episodes entered.
    pub recovery_episodes: u64,
}

/// Congestion control interfaces shared by different algorithms.
///
/// Implementations are not internally synchronized. Calls for one path must
/// be serialized by the caller.
pub trait SendAlgorithm {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Callback after a packet was sent out. Returns whether the packet is
    /// tracked by the congestion controller.
    fn on_packet_sent(
        &mut self,
        sent_time: Instant,
        bytes_in_flight: u64,
        pkt_num: u64,
        bytes: u64,
        is_retransmittable: bool,
    ) -> bool;

    /// Callback for an acknowledged packet.
    fn on_packet_acked(&mut self, pkt_num: u64, acked_bytes: u64, prior_in_flight: u64);

    /// Callback for a packet declared lost.
    fn on_packet_lost(&mut self, pkt_num: u64, lost_bytes: u64, prior_in_flight: u64);

    /// Advance time-driven state. Returns whether the controller state moved
    /// to a new epoch.
    ///
    /// Window queries do this implicitly, a scheduler may call it on its own.
    fn on_tick(&mut self, now: Instant) -> bool {
        false
    }

    /// Current congestion window in bytes.
    fn congestion_window(&mut self, now: Instant) -> u64;

    /// Whether a packet may be sent now given the bytes in flight.
    fn time_until_send(&mut self, now: Instant, bytes_in_flight: u64) -> SendDelay;

    /// Estimated bandwidth in bytes per second.
    fn bandwidth_estimate(&mut self, now: Instant) -> u64;

    /// Slow start threshold in bytes.
    fn slow_start_threshold(&self) -> u64;

    /// Check if in recovery mode.
    fn in_recovery(&self) -> bool {
        false
    }

    /// Multiplicative decrease factor applied by classic loss-based senders.
    fn reno_beta(&self) -> f32;

    /// Extra delay the retransmission timer should add.
    fn retransmission_delay(&self) -> Duration;

    /// Callback for a retransmission timeout.
    fn on_retransmission_timeout(&mut self, packets_retransmitted: bool) {}

    /// Callback after the path migrated to a new network address.
    fn on_connection_migration(&mut self) {}

    /// Set the number of TCP connections to emulate.
    fn set_num_emulated_connections(&mut self, num_connections: usize) {}

    /// Exit slow start with a large reduction of the congestion window.
    fn set_slow_start_large_reduction(&mut self, enabled: bool) {}

    /// Smoothed RTT of the path.
    fn smoothed_rtt(&self) -> Duration;

    /// Initial congestion window.
    fn initial_window(&self) -> u64;

    /// Minimal congestion window.
    fn minimal_window(&self) -> u64;

    /// Congestion stats.
    fn stats(&self) -> &CongestionStats;
}

impl fmt::Debug for dyn SendAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} congestion controller.", self.name())
    }
}

/// Slow start tracker driven by the packet lifecycle.
pub trait SlowStart {
    /// Callback after a retransmittable packet was sent out.
    fn on_packet_sent(&mut self, pkt_num: u64);

    /// Callback for an acknowledged packet with the current RTT sample.
    fn on_packet_acked(&mut self, pkt_num: u64, acked_bytes: u64, rtt: Duration);

    /// Whether the tracker signals that slow start should be left.
    fn should_exit_slow_start(&self) -> bool;

    /// Callback for a congestion event.
    fn on_congestion_event(&mut self) {}
}

/// Rate reduction helper used during loss recovery.
pub trait RateReduction {
    /// Callback after a packet was sent out during recovery.
    fn on_packet_sent(&mut self, sent_bytes: u64);

    /// Callback for an acknowledged packet during recovery.
    fn on_packet_acked(&mut self, acked_bytes: u64);

    /// Start a new recovery episode.
    fn on_packet_lost(&mut self, prior_in_flight: u64);

    /// Whether a packet may be sent now.
    fn time_until_send(&self, cwnd: u64, bytes_in_flight: u64, ssthresh: u64) -> SendDelay;
}

/// Bytes per second for a window delivered once per RTT. The RTT is clamped
/// to the timer granularity and the result saturates.
pub(crate) fn bandwidth(cwnd: u64, srtt: Duration) -> u64 {
    let srtt = srtt.max(TIMER_GRANULARITY);
    let bw = cwnd as u128 * 1_000_000_000 / srtt.as_nanos();
    u64::try_from(bw).unwrap_or(u64::MAX)
}

/// Build a congestion controller.
pub fn build_send_algorithm(
    conf: &RecoveryConfig,
    rtt: Rc<dyn RttSource>,
) -> Box<dyn SendAlgorithm> {
    let max_datagram_size: u64 = conf.max_datagram_size as u64;
    let min_cwnd = conf.min_congestion_window.saturating_mul(max_datagram_size);
    let initial_cwnd = conf
        .initial_congestion_window
        .saturating_mul(max_datagram_size);
    let max_cwnd = conf.max_congestion_window.saturating_mul(max_datagram_size);

    match conf.congestion_control_algorithm {
        CongestionControlAlgorithm::Vivace => {
            let mut config = VivaceConfig::new(min_cwnd, initial_cwnd, max_cwnd, max_datagram_size);
            config.set_latency_coefficient(conf.vivace_latency_coefficient);
            config.set_throughput_exponent(conf.vivace_throughput_exponent);
            config.enable_prr_recovery(conf.enable_prr_recovery);

            Box::new(Vivace::new(
                config,
                rtt,
                Box::new(HystartPlusPlus::new(conf.enable_hystart)),
                Box::new(PrrSender::new(max_datagram_size)),
            ))
        }
        CongestionControlAlgorithm::Dummy => Box::new(Dummy::new(initial_cwnd, rtt)),
    }
}


mod dummy;
mod hystart_plus_plus;
mod monitor_interval;
mod prr;
mod utility;
mod vivace;
