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

#![no_main]

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use libfuzzer_sys::fuzz_target;

use vivace::Config;

const MSS: u64 = 1200;

// Each input byte pair is one event: an opcode and an argument.
fuzz_target!(|data: &[u8]| {
    let mut conf = Config::new();
    conf.enable_prr_recovery(data.first().map_or(false, |b| b & 1 == 1));

    let rtt = Rc::new(Cell::new(Duration::from_millis(20)));
    let mut cc = vivace::build_send_algorithm(conf.recovery(), rtt.clone());
    let max_cwnd = conf.recovery().max_congestion_window * MSS;

    let mut now = Instant::now();
    let mut pkt_num = 0u64;
    let mut bytes_in_flight = 0u64;

    for op in data.chunks_exact(2) {
        let arg = op[1] as u64;
        match op[0] % 6 {
            0 => {
                cc.on_packet_sent(now, bytes_in_flight, pkt_num, MSS, arg % 8 != 0);
                bytes_in_flight += MSS;
                pkt_num += 1;
            }
            1 => {
                cc.on_packet_acked(pkt_num.saturating_sub(arg), MSS, bytes_in_flight);
                bytes_in_flight = bytes_in_flight.saturating_sub(MSS);
            }
            2 => {
                cc.on_packet_lost(pkt_num.saturating_sub(arg), MSS, bytes_in_flight);
                bytes_in_flight = bytes_in_flight.saturating_sub(MSS);
            }
            3 => now += Duration::from_millis(arg),
            4 => rtt.set(Duration::from_millis(arg)),
            _ => {
                cc.time_until_send(now, bytes_in_flight);
                cc.bandwidth_estimate(now);
            }
        }

        let cwnd = cc.congestion_window(now);
        assert!(cwnd >= cc.minimal_window());
        assert!(cwnd <= max_cwnd);
    }
});
