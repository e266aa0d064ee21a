//! Consumers of processed cycles

use crate::models::{BoundingBox, CandidateRegion, DecodedResult, Point, Symbology};
use crossbeam_channel::Sender;
use image::RgbImage;
use serde::Serialize;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A decoded payload attributed to the region it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionResult {
    /// Id of the candidate region within its cycle
    pub region_id: usize,
    /// Decoded payload, polygon in frame coordinates
    pub result: DecodedResult,
}

/// Everything one processing cycle produced
#[derive(Debug, Clone)]
pub struct CycleOutput {
    /// Zero-based cycle counter
    pub cycle: u64,
    /// Timestamp of the newest frame in the stacked window
    pub captured_at: Instant,
    /// Stacked frame with regions and labels drawn on it
    pub annotated: RgbImage,
    /// Candidate regions found in the stacked frame
    pub regions: Vec<CandidateRegion>,
    /// Decoded payloads, deduplicated within the cycle
    pub results: Vec<RegionResult>,
}

impl CycleOutput {
    /// Bounding box of the region a result belongs to
    pub fn region_bbox(&self, region_id: usize) -> Option<BoundingBox> {
        self.regions.iter().find(|r| r.id == region_id).map(|r| r.bbox)
    }
}

/// Whether the pipeline should keep running after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    /// Keep processing
    Continue,
    /// Stop the pipeline, e.g. on a quit request from the display
    Stop,
}

/// Receives the output of every cycle on the processing thread
pub trait Sink {
    /// Handle one cycle
    fn consume(&mut self, output: CycleOutput) -> SinkControl;

    /// Called exactly once when the pipeline stops
    fn close(&mut self) {}
}

/// Logs one line per decoded record
#[derive(Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn consume(&mut self, output: CycleOutput) -> SinkControl {
        debug!(
            cycle = output.cycle,
            regions = output.regions.len(),
            results = output.results.len(),
            "cycle complete"
        );
        for r in &output.results {
            info!(
                cycle = output.cycle,
                region = r.region_id,
                symbology = %r.result.symbology,
                backend = %r.result.backend,
                "detected {}",
                r.result.text
            );
        }
        SinkControl::Continue
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    cycle: u64,
    region_id: usize,
    bbox: Option<BoundingBox>,
    text: &'a str,
    symbology: &'a Symbology,
    confidence: Option<f32>,
    polygon: Option<&'a [Point]>,
    backend: &'a str,
}

/// Writes one JSON object per decoded record
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Write records to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_cycle(&mut self, output: &CycleOutput) -> std::io::Result<()> {
        for r in &output.results {
            let record = JsonRecord {
                cycle: output.cycle,
                region_id: r.region_id,
                bbox: output.region_bbox(r.region_id),
                text: &r.result.text,
                symbology: &r.result.symbology,
                confidence: r.result.confidence,
                polygon: r.result.polygon.as_deref(),
                backend: &r.result.backend,
            };
            serde_json::to_writer(&mut self.writer, &record)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn consume(&mut self, output: CycleOutput) -> SinkControl {
        match self.write_cycle(&output) {
            Ok(()) => SinkControl::Continue,
            Err(err) => {
                warn!(error = %err, "result writer failed, stopping");
                SinkControl::Stop
            }
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!(error = %err, "failed to flush results");
        }
    }
}

/// Forwards cycles to another thread
pub struct ChannelSink {
    tx: Sender<CycleOutput>,
}

impl ChannelSink {
    /// Forward cycles into `tx`
    pub fn new(tx: Sender<CycleOutput>) -> Self {
        Self { tx }
    }
}

impl Sink for ChannelSink {
    fn consume(&mut self, output: CycleOutput) -> SinkControl {
        // Receiver gone means nobody is watching any more
        match self.tx.send(output) {
            Ok(()) => SinkControl::Continue,
            Err(_) => SinkControl::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Symbology;

    fn output() -> CycleOutput {
        let region = CandidateRegion {
            id: 0,
            bbox: BoundingBox::new(10, 20, 30, 30),
            corners: [
                Point::new(10.0, 20.0),
                Point::new(39.0, 20.0),
                Point::new(39.0, 49.0),
                Point::new(10.0, 49.0),
            ],
            area: 841.0,
            aspect_ratio: 1.0,
        };
        CycleOutput {
            cycle: 7,
            captured_at: Instant::now(),
            annotated: RgbImage::new(4, 4),
            regions: vec![region],
            results: vec![RegionResult {
                region_id: 0,
                result: DecodedResult::new("PCB-0042", Symbology::DataMatrix, "rxing-datamatrix"),
            }],
        }
    }

    #[test]
    fn test_json_lines_record() {
        let mut sink = JsonLinesSink::new(Vec::new());
        assert_eq!(sink.consume(output()), SinkControl::Continue);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["cycle"], 7);
        assert_eq!(value["text"], "PCB-0042");
        assert_eq!(value["symbology"], "data_matrix");
        assert_eq!(value["bbox"]["width"], 30);
    }

    #[test]
    fn test_channel_sink_stops_when_receiver_dropped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = ChannelSink::new(tx);
        assert_eq!(sink.consume(output()), SinkControl::Continue);
        assert_eq!(rx.recv().unwrap().cycle, 7);
        drop(rx);
        assert_eq!(sink.consume(output()), SinkControl::Stop);
    }
}
