//! Stage timings and the text report the log scrapers key off.
//!
//! The report lines are a stable contract: `Time taken for <stage>: <seconds> seconds`, with
//! decompression printed to 4 decimals and the query stages and total to 6.

use std::{
  fmt,
  time::{Duration, Instant},
};

use lineitem_core::CodecKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  Decompression,
  Scan,
  Select,
  Sum,
}

impl Stage {
  pub const ALL: [Stage; 4] = [Stage::Decompression, Stage::Scan, Stage::Select, Stage::Sum];

  pub fn label(self) -> &'static str {
    match self {
      Stage::Decompression => "decompression",
      Stage::Scan => "q6 scan",
      Stage::Select => "q6 select",
      Stage::Sum => "q6 sum",
    }
  }

  fn precision(self) -> usize {
    match self {
      Stage::Decompression => 4,
      _ => 6,
    }
  }
}

pub const TOTAL_LABEL: &str = "q6 total";

/// Ordered (stage, elapsed) pairs of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingRecord {
  stages: Vec<(Stage, Duration)>,
}

impl TimingRecord {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, stage: Stage, elapsed: Duration) {
    self.stages.push((stage, elapsed));
  }

  /// Run `f`, recording its wall-clock time under `stage` whatever it returns.
  pub fn time<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    self.record(stage, start.elapsed());
    result
  }

  pub fn stages(&self) -> &[(Stage, Duration)] {
    &self.stages
  }

  pub fn get(&self, stage: Stage) -> Option<Duration> {
    self
      .stages
      .iter()
      .find(|(recorded, _)| *recorded == stage)
      .map(|(_, elapsed)| *elapsed)
  }

  pub fn total(&self) -> Duration {
    self.stages.iter().map(|(_, elapsed)| *elapsed).sum()
  }
}

impl fmt::Display for TimingRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (stage, elapsed) in &self.stages {
      writeln!(
        f,
        "Time taken for {}: {:.*} seconds",
        stage.label(),
        stage.precision(),
        elapsed.as_secs_f64()
      )?;
    }
    write!(
      f,
      "Time taken for {TOTAL_LABEL}: {:.6} seconds",
      self.total().as_secs_f64()
    )
  }
}

/// Heading printed before a run, e.g. `LZ4 decompression`.
pub fn codec_banner(codec: CodecKind) -> String {
  format!("{} decompression", codec.name().to_uppercase())
}

/// Per-codec decompression summary, e.g.
/// `Time took for single threaded LZ4 decompression: 0.0123 sec`.
pub fn decompression_summary(codec: CodecKind, concurrency: usize, elapsed: Duration) -> String {
  let threading = if concurrency <= 1 {
    "single threaded".to_string()
  } else {
    format!("{concurrency}-threaded")
  };
  format!(
    "Time took for {threading} {} decompression: {:.4} sec",
    codec.name().to_uppercase(),
    elapsed.as_secs_f64()
  )
}
