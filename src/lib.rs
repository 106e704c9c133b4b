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

//! Vivace is a rate-based congestion controller for QUIC transports.
//!
//! The controller measures the outcome of its sending rate over consecutive
//! monitoring intervals, each lasting one smoothed RTT. When an interval
//! completes, a utility function rewards the throughput achieved and
//! penalizes the RTT trend and the loss rate observed, and the utility is
//! added to the previous rate to produce the next one.
//!
//! ## Get started
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//! use std::time::Instant;
//!
//! use vivace::connection::rtt::RttEstimator;
//!
//! let mut conf = vivace::Config::new();
//! conf.set_initial_rtt(50);
//! let rtt = Rc::new(RefCell::new(RttEstimator::from_config(conf.recovery())));
//! assert_eq!(rtt.borrow().latest_rtt(), Duration::from_millis(50));
//! let mut cc = vivace::build_send_algorithm(conf.recovery(), rtt.clone());
//!
//! let now = Instant::now();
//! cc.on_packet_sent(now, 0, 1, 1200, true);
//! cc.on_packet_acked(1, 1200, 1200);
//! assert!(cc.congestion_window(now) >= cc.minimal_window());
//! ```
//!
//! ## Polling obligation
//!
//! Monitoring intervals rotate lazily: the expiry check runs inside
//! `congestion_window()` (and therefore `time_until_send()` and
//! `bandwidth_estimate()`), or inside an explicit `on_tick()`. Callers are
//! expected to do one of these at least once per smoothed RTT.
//!
//! ## Threading
//!
//! A controller is not internally synchronized. Each path owns its own
//! controller and all calls for that path must come from one logical control
//! path.

use std::cmp;
use std::time::Duration;

/// Result type for congestion control operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Default outgoing udp datagram payloads size.
pub const DEFAULT_SEND_UDP_PAYLOAD_SIZE: usize = 1200;

/// The RECOMMENDED value of the timer granularity is 1 millisecond.
/// See RFC 9002 Section 6.1
pub const TIMER_GRANULARITY: Duration = Duration::from_millis(1);

/// When no previous RTT is available, the initial RTT SHOULD be set to 333
/// milliseconds.
/// See RFC 9002 Section 6.2.2
pub const INITIAL_RTT: Duration = Duration::from_millis(333);

/// Default minimal congestion window in packets.
const DEFAULT_MIN_CONGESTION_WINDOW: u64 = 2;

/// Default initial congestion window in packets.
const DEFAULT_INITIAL_CONGESTION_WINDOW: u64 = 10;

/// Default maximum congestion window in packets.
const DEFAULT_MAX_CONGESTION_WINDOW: u64 = 10_000;

/// Default weight of the RTT gradient in the Vivace utility.
pub const DEFAULT_VIVACE_LATENCY_COEFFICIENT: f64 = 900.0;

/// Default exponent applied to the rate in the Vivace throughput reward.
pub const DEFAULT_VIVACE_THROUGHPUT_EXPONENT: f64 = 0.9;

/// Congestion control configurations.
///
/// The configuration may be customized by calling related set methods.
///
/// ## Examples:
///
/// ```
/// let mut conf = vivace::Config::new();
/// conf.set_congestion_control_algorithm(vivace::CongestionControlAlgorithm::Vivace);
/// conf.set_initial_congestion_window(20);
/// conf.set_initial_rtt(100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Congestion control configurations.
    recovery: RecoveryConfig,
}

impl Config {
    /// Create default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the recovery configurations used to build controllers.
    pub fn recovery(&self) -> &RecoveryConfig {
        &self.recovery
    }

    /// Set congestion control algorithm that the path would use.
    /// The default value is Vivace.
    pub fn set_congestion_control_algorithm(&mut self, cca: CongestionControlAlgorithm) {
        self.recovery.congestion_control_algorithm = cca;
    }

    /// Set the maximum outgoing UDP payload size in bytes. It is also the
    /// segment size used to turn a Vivace rate into a congestion window.
    /// The default value is `1200`, which is also the lower bound.
    pub fn set_send_udp_payload_size(&mut self, v: usize) {
        self.recovery.max_datagram_size = cmp::max(v, DEFAULT_SEND_UDP_PAYLOAD_SIZE);
    }

    /// Set the initial congestion window in packets.
    /// The default value is 10.
    pub fn set_initial_congestion_window(&mut self, packets: u64) {
        self.recovery.initial_congestion_window = packets;
    }

    /// Set the minimal congestion window in packets.
    /// The default value is 2.
    pub fn set_min_congestion_window(&mut self, packets: u64) {
        self.recovery.min_congestion_window = packets
    }

    /// Set the maximum congestion window in packets.
    /// The default value is 10000.
    pub fn set_max_congestion_window(&mut self, packets: u64) {
        self.recovery.max_congestion_window = packets
    }

    /// Set the initial RTT in milliseconds. The default value is 333ms.
    ///
    /// It seeds estimators built by `RttEstimator::from_config()` until the
    /// first RTT sample arrives.
    pub fn set_initial_rtt(&mut self, millis: u64) {
        self.recovery.initial_rtt = cmp::max(Duration::from_millis(millis), TIMER_GRANULARITY);
    }

    /// Set the weight of the RTT gradient penalty in the Vivace utility.
    /// The default value is 900. Negative or non-finite values are ignored.
    pub fn set_vivace_latency_coefficient(&mut self, v: f64) {
        if v.is_finite() && v >= 0.0 {
            self.recovery.vivace_latency_coefficient = v;
        }
    }

    /// Set the exponent of the Vivace throughput reward, in (0, 1].
    /// The default value is 0.9. Out of range values are ignored.
    pub fn set_vivace_throughput_exponent(&mut self, v: f64) {
        if v > 0.0 && v <= 1.0 {
            self.recovery.vivace_throughput_exponent = v;
        }
    }

    /// Enable proportional rate reduction during loss recovery episodes.
    /// The default value is false, in which case the controller never reports
    /// being in recovery.
    pub fn enable_prr_recovery(&mut self, v: bool) {
        self.recovery.enable_prr_recovery = v;
    }

    /// Enable HyStart++ as the slow start tracker.
    /// The default value is true.
    pub fn enable_hystart(&mut self, v: bool) {
        self.recovery.enable_hystart = v;
    }
}

/// Configurations about congestion control.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// The maximum size of outgoing UDP payloads.
    pub max_datagram_size: usize,

    /// The congestion control algorithm used for a path.
    pub congestion_control_algorithm: CongestionControlAlgorithm,

    /// The minimal congestion window in packets.
    /// The RECOMMENDED value is 2 packets.
    /// See RFC 9002 Section 7.2
    pub min_congestion_window: u64,

    /// The initial congestion window in packets.
    pub initial_congestion_window: u64,

    /// The maximum congestion window in packets.
    pub max_congestion_window: u64,

    /// The initial rtt, used before real rtt is estimated.
    pub initial_rtt: Duration,

    /// Weight of the RTT gradient in the Vivace utility.
    pub vivace_latency_coefficient: f64,

    /// Exponent applied to the rate in the Vivace throughput reward.
    pub vivace_throughput_exponent: f64,

    /// Enable PRR driven loss recovery episodes.
    pub enable_prr_recovery: bool,

    /// Enable HyStart++ slow start tracking.
    pub enable_hystart: bool,
}

impl Default for RecoveryConfig {
    fn default() -> RecoveryConfig {
        RecoveryConfig {
            max_datagram_size: DEFAULT_SEND_UDP_PAYLOAD_SIZE,
            congestion_control_algorithm: CongestionControlAlgorithm::Vivace,
            min_congestion_window: DEFAULT_MIN_CONGESTION_WINDOW,
            initial_congestion_window: DEFAULT_INITIAL_CONGESTION_WINDOW,
            max_congestion_window: DEFAULT_MAX_CONGESTION_WINDOW,
            initial_rtt: INITIAL_RTT,
            vivace_latency_coefficient: DEFAULT_VIVACE_LATENCY_COEFFICIENT,
            vivace_throughput_exponent: DEFAULT_VIVACE_THROUGHPUT_EXPONENT,
            enable_prr_recovery: false,
            enable_hystart: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[ctor::ctor]
    fn init() {
        env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .format_timestamp_millis()
            .is_test(true)
            .init();
    }

    #[test]
    fn config_default() {
        let conf = Config::new();
        let r = conf.recovery();
        assert_eq!(r.max_datagram_size, 1200);
        assert_eq!(
            r.congestion_control_algorithm,
            CongestionControlAlgorithm::Vivace
        );
        assert_eq!(r.min_congestion_window, 2);
        assert_eq!(r.initial_congestion_window, 10);
        assert_eq!(r.max_congestion_window, 10_000);
        assert_eq!(r.initial_rtt, Duration::from_millis(333));
        assert_eq!(r.vivace_latency_coefficient, 900.0);
        assert_eq!(r.vivace_throughput_exponent, 0.9);
        assert!(!r.enable_prr_recovery);
        assert!(r.enable_hystart);
    }

    #[test]
    fn config_setters() {
        let mut conf = Config::new();
        conf.set_congestion_control_algorithm(CongestionControlAlgorithm::Dummy);
        conf.set_send_udp_payload_size(1350);
        conf.set_initial_congestion_window(32);
        conf.set_min_congestion_window(4);
        conf.set_max_congestion_window(2000);
        conf.set_initial_rtt(50);
        conf.set_vivace_latency_coefficient(100.0);
        conf.set_vivace_throughput_exponent(0.5);
        conf.enable_prr_recovery(true);
        conf.enable_hystart(false);

        let r = conf.recovery();
        assert_eq!(r.congestion_control_algorithm, CongestionControlAlgorithm::Dummy);
        assert_eq!(r.max_datagram_size, 1350);
        assert_eq!(r.initial_congestion_window, 32);
        assert_eq!(r.min_congestion_window, 4);
        assert_eq!(r.max_congestion_window, 2000);
        assert_eq!(r.initial_rtt, Duration::from_millis(50));
        assert_eq!(r.vivace_latency_coefficient, 100.0);
        assert_eq!(r.vivace_throughput_exponent, 0.5);
        assert!(r.enable_prr_recovery);
        assert!(!r.enable_hystart);
    }

    #[test]
    fn config_lower_bounds() {
        let mut conf = Config::new();
        conf.set_send_udp_payload_size(500);
        conf.set_initial_rtt(0);
        conf.set_vivace_latency_coefficient(-1.0);
        conf.set_vivace_latency_coefficient(f64::NAN);
        conf.set_vivace_throughput_exponent(0.0);
        conf.set_vivace_throughput_exponent(1.5);

        let r = conf.recovery();
        assert_eq!(r.max_datagram_size, DEFAULT_SEND_UDP_PAYLOAD_SIZE);
        assert_eq!(r.initial_rtt, TIMER_GRANULARITY);
        assert_eq!(r.vivace_latency_coefficient, 900.0);
        assert_eq!(r.vivace_throughput_exponent, 0.9);
    }
}

pub use crate::congestion_control::build_send_algorithm;
pub use crate::congestion_control::CongestionControlAlgorithm;
pub use crate::congestion_control::CongestionStats;
pub use crate::congestion_control::SendAlgorithm;
pub use crate::congestion_control::SendDelay;
pub use crate::congestion_control::Vivace;
pub use crate::congestion_control::VivaceConfig;
pub use crate::connection::path::PathRegistry;
pub use crate::error::Error;

#[path = "connection/connection.rs"]
pub mod connection;

#[path = "congestion_control/congestion_control.rs"]
pub mod congestion_control;

#[path = "qlog/qlog.rs"]
pub mod qlog;

pub mod error;
