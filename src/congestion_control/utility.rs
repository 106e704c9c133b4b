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

//! Vivace utility function.
//!
//! The utility of a completed monitoring interval is
//!
//! ```text
//! u = rate^t * mss - k * rate * d(RTT)/ms - rate * loss_rate
//! ```
//!
//! where `t` is the throughput exponent (0.9) and `k` the latency coefficient
//! (900). `d(RTT)` is the difference between the durations of the last two
//! completed intervals, each of which is the smoothed RTT sampled when the
//! interval started.
//!
//! See <https://www.usenix.org/conference/nsdi18/presentation/dong>.

use serde::Deserialize;
use serde::Serialize;

use super::MonitorInterval;

/// Utility of a completed monitoring interval, with the terms it is made of.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct Utility {
    /// Sub-linear reward for the rate, in bytes.
    pub throughput_reward: f64,

    /// RTT change between the two intervals, in milliseconds.
    pub latency_gradient: f64,

    /// Penalty for a growing RTT.
    pub latency_penalty: f64,

    /// Lost packets over sent packets in the last interval.
    pub loss_rate: f64,

    /// Penalty for losses.
    pub loss_penalty: f64,

    /// `throughput_reward - latency_penalty - loss_penalty`
    pub value: f64,
}

impl Utility {
    /// Evaluate the utility of `last`, the most recently completed interval,
    /// against `previous`, the interval completed before it.
    pub fn evaluate(
        last: &MonitorInterval,
        previous: &MonitorInterval,
        mss: u64,
        latency_coefficient: f64,
        throughput_exponent: f64,
    ) -> Self {
        let rate = last.rate();

        // A negative base would yield NaN.
        let throughput_reward = rate.max(0.0).powf(throughput_exponent) * mss as f64;

        let latency_gradient =
            (last.duration().as_nanos() as f64 - previous.duration().as_nanos() as f64) / 1e6;
        let latency_penalty = latency_coefficient * rate * latency_gradient;

        let loss_rate = last.loss_rate();
        let loss_penalty = rate * loss_rate;

        Utility {
            throughput_reward,
            latency_gradient,
            latency_penalty,
            loss_rate,
            loss_penalty,
            value: throughput_reward - latency_penalty - loss_penalty,
        }
    }
}
