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

use std::cell::Cell;
use std::cell::RefCell;
use std::cmp;
use std::time::Duration;

use crate::RecoveryConfig;

/// Read-only view of the RTT of a path, as consumed by congestion control.
///
/// The transport owns and updates the estimation. Controllers only sample the
/// smoothed RTT, which may be zero or otherwise implausible; consumers are
/// responsible for clamping it.
pub trait RttSource {
    /// Return the current smoothed RTT.
    fn smoothed_rtt(&self) -> Duration;
}

/// RTT estimation for a network path
/// See RFC 9002 Section 5
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// The most recent RTT sample.
    latest_rtt: Duration,

    /// Exponentially weighted moving average of the adjusted RTT samples.
    /// `None` until the first sample arrives.
    smoothed_rtt: Option<Duration>,

    /// Mean deviation of the RTT samples.
    rttvar: Duration,

    /// The minimum RTT observed on the path, ignoring ack delay.
    min_rtt: Duration,
}

impl RttEstimator {
    pub fn new(initial_rtt: Duration) -> Self {
        Self {
            latest_rtt: initial_rtt,
            smoothed_rtt: None,
            rttvar: initial_rtt / 2,
            min_rtt: initial_rtt,
        }
    }

    /// Create an estimator seeded with the configured initial RTT.
    pub fn from_config(conf: &RecoveryConfig) -> Self {
        Self::new(conf.initial_rtt)
    }

    /// Return the latest rtt sample
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    /// Return the Minimum RTT observed so far for this estimator.
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    /// Return the variation in the RTT samples using a mean variation.
    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    /// Update estimator with the given RTT sample
    pub fn update(&mut self, ack_delay: Duration, rtt: Duration) {
        self.latest_rtt = rtt;

        let smoothed_rtt = match self.smoothed_rtt {
            Some(v) => v,
            None => {
                // First sample resets the estimation.
                self.smoothed_rtt = Some(rtt);
                self.rttvar = rtt / 2;
                self.min_rtt = rtt;
                return;
            }
        };

        self.min_rtt = cmp::min(self.min_rtt, rtt);

        // Ack delay is only subtracted if the result stays above min_rtt.
        let adjusted_rtt = if rtt >= self.min_rtt + ack_delay {
            rtt - ack_delay
        } else {
            rtt
        };

        let deviation = if smoothed_rtt > adjusted_rtt {
            smoothed_rtt - adjusted_rtt
        } else {
            adjusted_rtt - smoothed_rtt
        };
        self.rttvar = (self.rttvar * 3 + deviation) / 4;
        self.smoothed_rtt = Some((smoothed_rtt * 7 + adjusted_rtt) / 8);
    }
}

impl RttSource for RttEstimator {
    fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt.unwrap_or(self.latest_rtt)
    }
}

/// An estimator shared between the transport, which updates it, and one or
/// more controllers, which sample it.
impl<T: RttSource + ?Sized> RttSource for RefCell<T> {
    fn smoothed_rtt(&self) -> Duration {
        self.borrow().smoothed_rtt()
    }
}

/// A smoothed RTT driven directly by the caller.
impl RttSource for Cell<Duration> {
    fn smoothed_rtt(&self) -> Duration {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn initial() {
        let initial_rtt = Duration::from_millis(200);
        let r = RttEstimator::new(initial_rtt);
        assert_eq!(r.latest_rtt(), initial_rtt);
        assert_eq!(r.min_rtt(), initial_rtt);
        assert_eq!(r.rttvar(), initial_rtt / 2);
        assert_eq!(r.smoothed_rtt(), initial_rtt);
    }

    #[test]
    fn update() {
        let mut r = RttEstimator::new(Duration::from_millis(333));

        // First sample ignores ack delay.
        r.update(Duration::from_millis(100), Duration::from_millis(400));
        assert_eq!(r.latest_rtt(), Duration::from_millis(400));
        assert_eq!(r.min_rtt(), Duration::from_millis(400));
        assert_eq!(r.rttvar(), Duration::from_millis(200));
        assert_eq!(r.smoothed_rtt(), Duration::from_millis(400));

        // Adjusted sample is 600ms.
        r.update(Duration::from_millis(100), Duration::from_millis(700));
        assert_eq!(r.min_rtt(), Duration::from_millis(400));
        assert_eq!(r.rttvar(), Duration::from_millis(200));
        assert_eq!(r.smoothed_rtt(), Duration::from_millis(425));

        // Ack delay would take the sample below min_rtt, keep it as is.
        r.update(Duration::from_millis(100), Duration::from_millis(225));
        assert_eq!(r.min_rtt(), Duration::from_millis(225));
        assert_eq!(r.rttvar(), Duration::from_millis(200));
        assert_eq!(r.smoothed_rtt(), Duration::from_millis(400));
    }

    #[test]
    fn initial_rtt_from_config() {
        let mut conf = crate::Config::new();
        let r = RttEstimator::from_config(conf.recovery());
        assert_eq!(r.smoothed_rtt(), crate::INITIAL_RTT);

        conf.set_initial_rtt(1000);
        let mut r = RttEstimator::from_config(conf.recovery());
        assert_eq!(r.smoothed_rtt(), Duration::from_millis(1000));
        assert_eq!(r.rttvar(), Duration::from_millis(500));

        // The first sample replaces the configured value.
        r.update(Duration::ZERO, Duration::from_millis(40));
        assert_eq!(r.smoothed_rtt(), Duration::from_millis(40));
    }

    #[test]
    fn shared_sources() {
        let shared = Rc::new(RefCell::new(RttEstimator::new(Duration::from_millis(10))));
        let source: Rc<dyn RttSource> = shared.clone();
        assert_eq!(source.smoothed_rtt(), Duration::from_millis(10));

        shared
            .borrow_mut()
            .update(Duration::ZERO, Duration::from_millis(30));
        assert_eq!(source.smoothed_rtt(), Duration::from_millis(30));

        let fixed = Rc::new(Cell::new(Duration::from_millis(5)));
        let source: Rc<dyn RttSource> = fixed.clone();
        fixed.set(Duration::from_millis(8));
        assert_eq!(source.smoothed_rtt(), Duration::from_millis(8));
    }
}
