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

//! Recovery event definitions of draft-ietf-quic-qlog-quic-events-06, plus
//! an event describing each Vivace rate update.

use serde::Deserialize;
use serde::Serialize;

use crate::congestion_control::Utility;

/// Each event is specified as a generic object with a number of member fields
/// and their associated data.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Event {
    /// Milliseconds since the writer was created.
    pub time: f32,

    /// The data field is a generic object. It contains the per-event metadata
    /// and its form and semantics are defined per specific sort of event.
    #[serde(flatten)]
    pub data: EventData,

    /// Associates the event with a conceptual group, e.g. a path.
    pub group_id: Option<String>,
}

impl Event {
    pub fn new(time: f32, data: EventData) -> Self {
        Event {
            time,
            data,
            group_id: None,
        }
    }

    /// Return the importance of the event.
    pub fn importance(&self) -> EventImportance {
        self.data.importance()
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(tag = "name", content = "data")]
pub enum EventData {
    /// Initial congestion control settings, emitted once when logging starts.
    #[serde(rename = "recovery:parameters_set")]
    RecoveryParametersSet {
        initial_rtt: Option<f32>,
        max_datagram_size: Option<u32>,
        initial_congestion_window: Option<u64>,
        minimum_congestion_window: Option<u64>,
    },

    /// One or more of the observable recovery metrics changed value.
    #[serde(rename = "recovery:metrics_updated")]
    RecoveryMetricsUpdated {
        smoothed_rtt: Option<f32>,
        congestion_window: Option<u64>,
        bytes_in_flight: Option<u64>,
        ssthresh: Option<u64>,
        pacing_rate: Option<u64>,
    },

    /// A monitoring interval completed and the sending rate was updated.
    #[serde(rename = "recovery:vivace_rate_updated")]
    RecoveryVivaceRateUpdated {
        /// Rate of the completed interval, in segments per interval.
        old_rate: f64,

        /// Rate of the new active interval.
        new_rate: f64,

        /// Duration of the new active interval in milliseconds.
        interval: f32,

        sent_packets: u64,
        acked_packets: u64,
        lost_packets: u64,
        utility: Utility,
    },
}

impl EventData {
    /// Return the importance of the event data.
    pub fn importance(&self) -> EventImportance {
        match *self {
            EventData::RecoveryParametersSet { .. } => EventImportance::Base,
            EventData::RecoveryMetricsUpdated { .. } => EventImportance::Core,
            EventData::RecoveryVivaceRateUpdated { .. } => EventImportance::Extra,
        }
    }
}

/// An "importance indicator" in decreasing order of importance and expected
/// usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventImportance {
    /// The "Core" events are the events that SHOULD be present in all qlog
    /// files for a given protocol.
    Core = 0,

    /// The "Base" events add additional debugging options and CAN be present
    /// in qlog files.
    Base = 1,

    /// The "Extra" events are considered mostly useful for low-level debugging
    /// of the implementation, rather than the protocol.
    Extra = 2,
}

impl EventImportance {
    /// Return true if this importance level is included by `other`.
    pub fn is_contained_in(&self, other: &EventImportance) -> bool {
        self <= other
    }
}
