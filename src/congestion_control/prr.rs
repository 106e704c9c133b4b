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

//! Proportional Rate Reduction for TCP.
//!
//! PRR spreads the window reduction of a recovery episode over the acks that
//! arrive during the episode, instead of stopping transmission until enough
//! data left the network. When the window is already above the bytes in
//! flight, the slow start reduction bound (PRR-SSRB) allows at most one extra
//! segment per ack.
//!
//! See <https://www.rfc-editor.org/rfc/rfc6937.html>.

use super::RateReduction;
use super::SendDelay;

/// Proportional rate reduction state of one recovery episode.
#[derive(Debug, Default)]
pub struct PrrSender {
    /// prr_out: bytes sent since the episode started.
    bytes_sent_since_loss: u64,

    /// prr_delivered: bytes delivered since the episode started.
    bytes_delivered_since_loss: u64,

    /// Acks received since the episode started.
    ack_count_since_loss: u64,

    /// RecoverFS: bytes in flight when the episode started.
    bytes_in_flight_before_loss: u64,

    /// Max segment size in bytes.
    mss: u64,
}

impl PrrSender {
    pub fn new(mss: u64) -> Self {
        Self {
            mss,
            ..Default::default()
        }
    }
}

impl RateReduction for PrrSender {
    fn on_packet_sent(&mut self, sent_bytes: u64) {
        self.bytes_sent_since_loss = self.bytes_sent_since_loss.saturating_add(sent_bytes);
    }

    fn on_packet_acked(&mut self, acked_bytes: u64) {
        self.bytes_delivered_since_loss =
            self.bytes_delivered_since_loss.saturating_add(acked_bytes);
        self.ack_count_since_loss = self.ack_count_since_loss.saturating_add(1);
    }

    fn on_packet_lost(&mut self, prior_in_flight: u64) {
        self.bytes_sent_since_loss = 0;
        self.bytes_delivered_since_loss = 0;
        self.ack_count_since_loss = 0;
        self.bytes_in_flight_before_loss = prior_in_flight;
    }

    fn time_until_send(&self, cwnd: u64, bytes_in_flight: u64, ssthresh: u64) -> SendDelay {
        // Nothing sent in this episode yet, or nearly nothing in flight.
        if self.bytes_sent_since_loss == 0 || bytes_in_flight < self.mss {
            return SendDelay::Immediate;
        }

        if cwnd > bytes_in_flight {
            // PRR-SSRB: limit = MAX(prr_delivered - prr_out, DeliveredData) + MSS
            let limit = self.bytes_delivered_since_loss.saturating_add(
                self.ack_count_since_loss.saturating_mul(self.mss),
            );
            if limit <= self.bytes_sent_since_loss {
                return SendDelay::Blocked;
            }
            return SendDelay::Immediate;
        }

        // sndcnt = CEIL(prr_delivered * ssthresh / RecoverFS) - prr_out,
        // checked without the division.
        let allowed = (self.bytes_delivered_since_loss as u128) * (ssthresh as u128);
        let used = (self.bytes_sent_since_loss as u128) * (self.bytes_in_flight_before_loss as u128);
        if allowed > used {
            SendDelay::Immediate
        } else {
            SendDelay::Blocked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSS: u64 = 1200;

    #[test]
    fn prr_sends_on_every_other_ack() {
        let mut prr = PrrSender::new(MSS);
        let packets_in_flight = 50;
        let mut bytes_in_flight = packets_in_flight * MSS;
        let ssthresh = packets_in_flight / 2 * MSS;
        let cwnd = ssthresh;

        prr.on_packet_lost(bytes_in_flight);

        // The first ack lets one packet out.
        prr.on_packet_acked(MSS);
        bytes_in_flight -= MSS;
        assert_eq!(
            prr.time_until_send(cwnd, bytes_in_flight, ssthresh),
            SendDelay::Immediate
        );
        prr.on_packet_sent(MSS);
        assert_eq!(
            prr.time_until_send(cwnd, bytes_in_flight, ssthresh),
            SendDelay::Blocked
        );

        // Half the window was cut: a packet leaves on every other ack.
        for _ in 0..packets_in_flight / 2 - 1 {
            prr.on_packet_acked(MSS);
            bytes_in_flight -= MSS;
            assert_eq!(
                prr.time_until_send(cwnd, bytes_in_flight, ssthresh),
                SendDelay::Blocked
            );

            prr.on_packet_acked(MSS);
            bytes_in_flight -= MSS;
            assert_eq!(
                prr.time_until_send(cwnd, bytes_in_flight, ssthresh),
                SendDelay::Immediate
            );
            prr.on_packet_sent(MSS);
            bytes_in_flight += MSS;
        }
        assert_eq!(bytes_in_flight, cwnd);
    }

    #[test]
    fn prr_slow_start_reduction_bound() {
        let mut prr = PrrSender::new(MSS);
        let mut bytes_in_flight = 20 * MSS;
        let ssthresh = 10 * MSS;
        let cwnd = 30 * MSS;

        prr.on_packet_lost(bytes_in_flight);
        prr.on_packet_acked(MSS);
        bytes_in_flight -= MSS;

        // One ack allows the delivered bytes plus one extra segment.
        assert!(prr.time_until_send(cwnd, bytes_in_flight, ssthresh).can_send());
        prr.on_packet_sent(MSS);
        assert!(prr.time_until_send(cwnd, bytes_in_flight, ssthresh).can_send());
        prr.on_packet_sent(MSS);
        assert!(!prr.time_until_send(cwnd, bytes_in_flight, ssthresh).can_send());
    }

    #[test]
    fn prr_small_flight_always_sends() {
        let mut prr = PrrSender::new(MSS);
        prr.on_packet_lost(10 * MSS);
        prr.on_packet_sent(5 * MSS);
        assert_eq!(prr.time_until_send(MSS, MSS - 1, MSS), SendDelay::Immediate);
    }
}
