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

//! A streaming qlog writer for congestion control traces.

use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;

use self::events::Event;
use self::events::EventData;
use self::events::EventImportance;
use crate::Error;
use crate::Result;

/// The qlog_version is 0.4 for draft-ietf-quic-qlog-main-schema-07
pub const QLOG_VERSION: &str = "0.4";

/// The serialization format for QlogFileSeq is JSON-SEQ
/// See RFC 7464: JavaScript Object Notation (JSON) Text Sequences
pub const JSON_TEXT_SEQS: &str = "JSON-SEQ";

/// A qlog file using the QlogFileSeq schema can be serialized to a streamable
/// JSON format called JSON Text Sequences (JSON-SEQ) ([RFC7464])
/// See draft-ietf-quic-qlog-main-schema-07
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QlogFileSeq {
    /// The qlog_format field MUST have the value "JSON-SEQ".
    pub qlog_format: String,

    /// The qlog_version field MUST have the value "0.4".
    pub qlog_version: String,

    /// Free-text title of the file.
    pub title: Option<String>,

    /// The trace field contains a singular trace metadata. All qlog events in
    /// the file are related to this trace.
    pub trace: TraceSeq,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct TraceSeq {
    pub title: Option<String>,
    pub vantage_point: VantagePoint,
}

/// Describes the vantage point from which the trace originates.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct VantagePoint {
    /// Name of the vantage point.
    pub name: Option<String>,

    /// Type of vantage point may be Client/Server/Network/Unknown.
    pub r#type: VantagePointType,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum VantagePointType {
    /// Endpoint which initiates the connection
    Client,

    /// Endpoint which accepts the connection
    Server,

    /// Observer in between client and server
    Network,

    Unknown,
}

/// Qlog writer using the QlogFileSeq schema
pub struct QlogWriter {
    /// The top-level element written once by `start()`.
    qlog: QlogFileSeq,

    /// Events below this level will not be written out.
    level: EventImportance,

    /// The underlying writer for qlog streaming
    writer: Box<dyn std::io::Write>,

    /// Whether the top-level element (QlogFileSeq) has been written
    ready: bool,

    /// The created time for the QlogWriter
    start_time: Instant,
}

impl QlogWriter {
    pub fn new(
        title: Option<String>,
        trace: TraceSeq,
        level: EventImportance,
        writer: Box<dyn std::io::Write>,
        start_time: Instant,
    ) -> Self {
        let qlog = QlogFileSeq {
            qlog_format: JSON_TEXT_SEQS.to_string(),
            qlog_version: QLOG_VERSION.to_string(),
            title,
            trace,
        };

        QlogWriter {
            qlog,
            level,
            writer,
            ready: false,
            start_time,
        }
    }

    /// Start qlog serialization and write the QlogFileSeq.
    pub fn start(&mut self) -> Result<()> {
        if self.ready {
            return Err(Error::Done);
        }

        self.writer.as_mut().write_all(b" ")?;
        serde_json::to_writer(self.writer.as_mut(), &self.qlog).map_err(|_| Error::Done)?;
        self.writer.as_mut().write_all(b"\n")?;
        self.ready = true;
        Ok(())
    }

    /// Flush qlog serialization data.
    pub fn flush(&mut self) -> Result<()> {
        if !self.ready {
            return Err(Error::InvalidState("expect ready state".into()));
        }

        self.writer.as_mut().flush()?;
        Ok(())
    }

    /// Write an event in JSON-SEQ format.
    pub fn add_event(&mut self, event: Event) -> Result<()> {
        self.check(event.importance())?;

        self.writer.as_mut().write_all(b" ")?;
        serde_json::to_writer(self.writer.as_mut(), &event).map_err(|_| Error::Done)?;
        self.writer.as_mut().write_all(b"\n")?;
        Ok(())
    }

    /// Write an event in JSON-SEQ format.
    pub fn add_event_data(&mut self, time: Instant, event_data: EventData) -> Result<()> {
        let event = Event::new(self.relative_time(time), event_data);
        self.add_event(event)
    }

    /// Return whether the event should be written
    fn check(&self, ei: EventImportance) -> Result<()> {
        if !self.ready {
            return Err(Error::InvalidState("not ready".into()));
        }
        if !ei.is_contained_in(&self.level) {
            return Err(Error::Done);
        }
        Ok(())
    }

    /// Return the relative time for the writer in milliseconds.
    pub fn relative_time(&self, time: Instant) -> f32 {
        let duration = time.saturating_duration_since(self.start_time);
        duration.as_secs_f32() * 1000.0
    }
}

impl std::fmt::Debug for QlogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "QlogWriter level={:?} ready={}", self.level, self.ready)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    /// An in-memory sink shared with the test after being boxed.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub(crate) Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn new_test_trace_seq() -> TraceSeq {
        TraceSeq {
            title: Some("qlog trace".to_string()),
            vantage_point: VantagePoint {
                name: None,
                r#type: VantagePointType::Client,
            },
        }
    }

    #[test]
    fn qlog_writer_operations() -> Result<()> {
        let buf = SharedBuf::default();
        let start_time = Instant::now();
        let mut qlog_writer = QlogWriter::new(
            Some("title".to_string()),
            new_test_trace_seq(),
            EventImportance::Base,
            Box::new(buf.clone()),
            start_time,
        );
        assert_eq!(qlog_writer.flush(), Err(Error::InvalidState("expect ready state".into())));

        // Add an event before the QlogWriter is started
        let event1 = Event::new(
            0.0,
            EventData::RecoveryMetricsUpdated {
                smoothed_rtt: Some(10.0),
                congestion_window: None,
                bytes_in_flight: None,
                ssthresh: None,
                pacing_rate: None,
            },
        );
        assert!(qlog_writer.add_event(event1.clone()).is_err());

        // Start the QlogWriter
        qlog_writer.start()?;
        assert_eq!(qlog_writer.start(), Err(Error::Done));

        qlog_writer.add_event(event1)?;

        // Events with lower importance are filtered out.
        let event2 = EventData::RecoveryVivaceRateUpdated {
            old_rate: 1.0,
            new_rate: 1.0,
            interval: 1.0,
            sent_packets: 0,
            acked_packets: 0,
            lost_packets: 0,
            utility: Default::default(),
        };
        assert_eq!(qlog_writer.add_event_data(start_time, event2), Err(Error::Done));

        let event3 = EventData::RecoveryParametersSet {
            initial_rtt: Some(333.0),
            max_datagram_size: Some(1200),
            initial_congestion_window: Some(12000),
            minimum_congestion_window: Some(2400),
        };
        qlog_writer.add_event_data(start_time, event3)?;
        qlog_writer.flush()?;

        assert_eq!(
            buf.contents(),
            r#" {"qlog_format":"JSON-SEQ","qlog_version":"0.4","title":"title","trace":{"title":"qlog trace","vantage_point":{"type":"client"}}}
 {"time":0.0,"name":"recovery:metrics_updated","data":{"smoothed_rtt":10.0}}
 {"time":0.0,"name":"recovery:parameters_set","data":{"initial_rtt":333.0,"max_datagram_size":1200,"initial_congestion_window":12000,"minimum_congestion_window":2400}}
"#
        );

        Ok(())
    }

    #[test]
    fn qlog_relative_time() {
        let start_time = Instant::now();
        let w = QlogWriter::new(
            None,
            new_test_trace_seq(),
            EventImportance::Extra,
            Box::new(SharedBuf::default()),
            start_time,
        );
        assert_eq!(w.relative_time(start_time), 0.0);
        assert_eq!(
            w.relative_time(start_time + std::time::Duration::from_millis(250)),
            250.0
        );
    }
}

pub mod events;
