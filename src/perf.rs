//! Lightweight performance aggregation utilities.
//!
//! Coarse timings and counters for the load → generate → write phases,
//! printed as an end-of-run summary with `--verbose`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Named metrics tracked by the perf collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Metric {
    RuntimeFromConfig,
    EncoderLoad,
    EncoderEmbed,
    GeneratorLoad,
    GenerateBatch,
    StageOne,
    StageTwo,
    RenderGrid,
    WriteImage,
    SentencesEmbedded,
    SamplesGenerated,
    ImagesWritten,
}

impl Metric {
    const COUNT: usize = 12;

    const ALL: [Metric; Metric::COUNT] = [
        Metric::RuntimeFromConfig,
        Metric::EncoderLoad,
        Metric::EncoderEmbed,
        Metric::GeneratorLoad,
        Metric::GenerateBatch,
        Metric::StageOne,
        Metric::StageTwo,
        Metric::RenderGrid,
        Metric::WriteImage,
        Metric::SentencesEmbedded,
        Metric::SamplesGenerated,
        Metric::ImagesWritten,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Dotted name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Metric::RuntimeFromConfig => "runtime.from_config",
            Metric::EncoderLoad => "encoder.load",
            Metric::EncoderEmbed => "encoder.embed",
            Metric::GeneratorLoad => "generator.load",
            Metric::GenerateBatch => "generator.batch",
            Metric::StageOne => "generator.stage1",
            Metric::StageTwo => "generator.stage2",
            Metric::RenderGrid => "render.grid",
            Metric::WriteImage => "render.write",
            Metric::SentencesEmbedded => "sentences.embedded",
            Metric::SamplesGenerated => "samples.generated",
            Metric::ImagesWritten => "images.written",
        }
    }

    fn is_counter(self) -> bool {
        matches!(
            self,
            Metric::SentencesEmbedded | Metric::SamplesGenerated | Metric::ImagesWritten
        )
    }
}

struct PerfCollector {
    start: Instant,
    totals_us: [AtomicU64; Metric::COUNT],
    counts: [AtomicU64; Metric::COUNT],
}

impl PerfCollector {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            totals_us: std::array::from_fn(|_| AtomicU64::new(0)),
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    fn add_duration(&self, metric: Metric, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.totals_us[metric.index()].fetch_add(micros, Ordering::Relaxed);
        self.counts[metric.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn add_count(&self, metric: Metric, delta: u64) {
        self.counts[metric.index()].fetch_add(delta, Ordering::Relaxed);
    }
}

static COLLECTOR: OnceLock<PerfCollector> = OnceLock::new();

fn collector() -> &'static PerfCollector {
    COLLECTOR.get_or_init(PerfCollector::new)
}

/// A RAII timer that records its duration when dropped.
pub struct PerfSpan {
    metric: Metric,
    start: Instant,
}

impl Drop for PerfSpan {
    fn drop(&mut self) {
        collector().add_duration(self.metric, self.start.elapsed());
    }
}

/// Begin a named timing span.
pub fn span(metric: Metric) -> PerfSpan {
    PerfSpan {
        metric,
        start: Instant::now(),
    }
}

/// Record a counter delta for a named metric.
pub fn add_count(metric: Metric, delta: u64) {
    collector().add_count(metric, delta);
}

/// Current value of a counter (or number of spans for a duration metric).
pub fn count(metric: Metric) -> u64 {
    collector().counts[metric.index()].load(Ordering::Relaxed)
}

/// Format a report of all collected metrics.
pub fn report() -> String {
    let collector = collector();
    let mut durations = Vec::new();
    let mut counters = Vec::new();
    for metric in Metric::ALL {
        let total_us = collector.totals_us[metric.index()].load(Ordering::Relaxed);
        let count = collector.counts[metric.index()].load(Ordering::Relaxed);
        if count == 0 {
            continue;
        }
        if metric.is_counter() {
            counters.push((metric, count));
        } else {
            durations.push((metric, total_us, count));
        }
    }
    durations.sort_by(|a, b| b.1.cmp(&a.1));

    let mut output = String::new();
    let _ = writeln!(
        &mut output,
        "Performance summary (uptime: {:.3}s)",
        collector.start.elapsed().as_secs_f64()
    );
    if durations.is_empty() && counters.is_empty() {
        let _ = writeln!(&mut output, "No performance data recorded.");
        return output;
    }
    if !durations.is_empty() {
        let _ = writeln!(&mut output, "Durations:");
        let _ = writeln!(
            &mut output,
            "  {:<24} {:>10} {:>8} {:>10}",
            "name", "total", "count", "avg"
        );
        for (metric, total_us, count) in durations {
            let _ = writeln!(
                &mut output,
                "  {:<24} {:>10.3}s {:>8} {:>10.3}ms",
                metric.name(),
                total_us as f64 / 1_000_000.0,
                count,
                total_us as f64 / count as f64 / 1000.0
            );
        }
    }
    if !counters.is_empty() {
        let _ = writeln!(&mut output, "Counters:");
        for (metric, value) in counters {
            let _ = writeln!(&mut output, "  {:<24} {}", metric.name(), value);
        }
    }
    output
}
