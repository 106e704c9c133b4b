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

//! HyStart++: Modified Slow Start for TCP.
//!
//! HyStart++ uses an increase in round-trip delay as a heuristic to find an
//! exit point from slow start before an overshoot, with a conservative phase
//! that guards against exits caused by jitter.
//!
//! Vivace does not grow its window by slow start. It keeps the tracker fed so
//! the exit signal stays available to recovery logic and diagnostics.
//!
//! See <https://www.rfc-editor.org/rfc/rfc9406.html>.

use std::time::Duration;

use super::SlowStart;

/// Lower bound of the delay increase sensitivity.
const MIN_RTT_THRESH: Duration = Duration::from_millis(4);

/// Upper bound of the delay increase sensitivity.
const MAX_RTT_THRESH: Duration = Duration::from_millis(16);

/// Fraction of RTT used to compute the delay threshold.
const MIN_RTT_DIVISOR: u32 = 8;

/// The least sample counts in one round.
const N_RTT_SAMPLE: u32 = 8;

/// The max lasting rounds in Conservative Slow Start (CSS).
const CSS_ROUNDS: u32 = 5;

/// HyStart++ phase.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum HystartPhase {
    /// Standard slow start.
    Standard,

    /// Conservative slow start, entered on a delay increase.
    Conservative { rounds: u32, baseline_min_rtt: Duration },

    /// Slow start should be left.
    Exited,
}

/// Implementation of HyStart++.
#[derive(Debug)]
pub struct HystartPlusPlus {
    /// Whether Hystart++ is enabled.
    enabled: bool,

    /// Current phase.
    phase: HystartPhase,

    /// lastRoundMinRTT
    last_round_min_rtt: Option<Duration>,

    /// currentRoundMinRTT
    current_round_min_rtt: Option<Duration>,

    /// rttSampleCount
    rtt_sample_count: u32,

    /// The last sent packet number.
    last_sent_pkt_num: u64,

    /// windowEnd: the packet number ending the current round.
    window_end: u64,
}

impl HystartPlusPlus {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            phase: HystartPhase::Standard,
            last_round_min_rtt: None,
            current_round_min_rtt: None,
            rtt_sample_count: 0,
            last_sent_pkt_num: 0,
            window_end: 0,
        }
    }

    /// Whether Hystart++ is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether in conservative slow start phase.
    pub fn in_conservative_slow_start(&self) -> bool {
        matches!(self.phase, HystartPhase::Conservative { .. })
    }

    fn check_delay_increase(&mut self) {
        if self.rtt_sample_count < N_RTT_SAMPLE {
            return;
        }
        let (current, last) = match (self.current_round_min_rtt, self.last_round_min_rtt) {
            (Some(current), Some(last)) => (current, last),
            _ => return,
        };

        match self.phase {
            HystartPhase::Standard => {
                let thresh = (last / MIN_RTT_DIVISOR).clamp(MIN_RTT_THRESH, MAX_RTT_THRESH);
                if current >= last.saturating_add(thresh) {
                    self.phase = HystartPhase::Conservative {
                        rounds: 0,
                        baseline_min_rtt: current,
                    };
                }
            }
            HystartPhase::Conservative {
                baseline_min_rtt, ..
            } if current < baseline_min_rtt => {
                // The delay increase was spurious.
                self.phase = HystartPhase::Standard;
            }
            _ => (),
        }
    }

    fn end_round(&mut self) {
        self.window_end = self.last_sent_pkt_num;
        self.last_round_min_rtt = self.current_round_min_rtt.take();
        self.rtt_sample_count = 0;

        if let HystartPhase::Conservative {
            rounds,
            baseline_min_rtt,
        } = self.phase
        {
            self.phase = if rounds + 1 >= CSS_ROUNDS {
                HystartPhase::Exited
            } else {
                HystartPhase::Conservative {
                    rounds: rounds + 1,
                    baseline_min_rtt,
                }
            };
        }
    }
}

impl SlowStart for HystartPlusPlus {
    fn on_packet_sent(&mut self, pkt_num: u64) {
        self.last_sent_pkt_num = pkt_num;
    }

    fn on_packet_acked(&mut self, pkt_num: u64, acked_bytes: u64, rtt: Duration) {
        if !self.enabled || self.phase == HystartPhase::Exited {
            return;
        }

        // An ack beyond windowEnd starts a new round.
        if pkt_num > self.window_end {
            self.end_round();
        }

        self.current_round_min_rtt = Some(match self.current_round_min_rtt {
            Some(min_rtt) => min_rtt.min(rtt),
            None => rtt,
        });
        self.rtt_sample_count = self.rtt_sample_count.saturating_add(1);
        self.check_delay_increase();
    }

    fn should_exit_slow_start(&self) -> bool {
        self.phase == HystartPhase::Exited
    }

    fn on_congestion_event(&mut self) {
        if self.enabled {
            self.window_end = 0;
            self.phase = HystartPhase::Exited;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Send and ack one round of `N_RTT_SAMPLE` packets whose RTT samples
    /// start at `min_rtt_ms`.
    fn run_round(h: &mut HystartPlusPlus, next_pkt_num: &mut u64, min_rtt_ms: u64) {
        let first = *next_pkt_num;
        let last = first + N_RTT_SAMPLE as u64 - 1;
        for pkt_num in first..=last {
            h.on_packet_sent(pkt_num);
        }
        for (i, pkt_num) in (first..=last).enumerate() {
            let rtt = Duration::from_millis(min_rtt_ms + i as u64);
            h.on_packet_acked(pkt_num, 1200, rtt);
        }
        *next_pkt_num = last + 1;
    }

    #[test]
    fn hystart_phases() {
        let mut h = HystartPlusPlus::new(true);
        assert!(h.enabled());
        assert!(!h.should_exit_slow_start());

        let mut pkt_num = 1;

        for rtt in [30, 32] {
            run_round(&mut h, &mut pkt_num, rtt);
            assert!(!h.in_conservative_slow_start());
        }

        // 32ms -> 40ms exceeds the 4ms threshold.
        run_round(&mut h, &mut pkt_num, 40);
        assert!(h.in_conservative_slow_start());

        // Below the CSS baseline: back to standard slow start.
        run_round(&mut h, &mut pkt_num, 35);
        assert!(!h.in_conservative_slow_start());

        run_round(&mut h, &mut pkt_num, 45);
        assert!(h.in_conservative_slow_start());

        for rtt in [46, 47, 48, 49, 50] {
            assert!(!h.should_exit_slow_start());
            run_round(&mut h, &mut pkt_num, rtt);
        }
        assert!(h.should_exit_slow_start());
    }

    #[test]
    fn hystart_disabled() {
        let mut h = HystartPlusPlus::new(false);
        let mut pkt_num = 1;
        for rtt in [10, 50, 100, 150, 200, 250, 300, 350] {
            run_round(&mut h, &mut pkt_num, rtt);
        }
        assert!(!h.should_exit_slow_start());

        h.on_congestion_event();
        assert!(!h.should_exit_slow_start());
    }

    #[test]
    fn hystart_congestion_event() {
        let mut h = HystartPlusPlus::new(true);
        h.on_packet_sent(1);
        h.on_congestion_event();
        assert!(h.should_exit_slow_start());
    }
}
