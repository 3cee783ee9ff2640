use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use humantime::format_duration;
use serde::Serialize;

use crate::executor::RunOutcome;
use crate::models::dsl_model::{LoadProfile, TestConfig};
use crate::models::metrics::{Metrics, ThresholdResult};
use crate::utils::hardware::HostInfo;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_THRESHOLDS_FAILED: u8 = 99;
pub const EXIT_INVALID_CONFIG: u8 = 104;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub target_url: String,
    pub timestamp: String,
    pub duration_secs: f64,
    pub peak_vus: u64,
    pub metrics: Metrics,
    pub thresholds: Vec<ThresholdResult>,
    pub forced_stops: usize,
    pub interrupted: bool,
    pub passed: bool,
    pub host: HostInfo,
}

impl Report {
    pub fn new(config: &TestConfig, outcome: RunOutcome, host: HostInfo) -> Self {
        let passed = outcome.passed();
        Self {
            name: config.name.clone(),
            target_url: config.url.clone(),
            timestamp: Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
            duration_secs: outcome.elapsed.as_secs_f64(),
            peak_vus: outcome.peak_vus,
            metrics: outcome.metrics,
            thresholds: outcome.thresholds,
            forced_stops: outcome.forced_stops,
            interrupted: outcome.interrupted,
            passed,
            host,
        }
    }

    pub fn exit_code(&self) -> u8 {
        if self.passed {
            EXIT_OK
        } else {
            EXIT_THRESHOLDS_FAILED
        }
    }

    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing summary to {}", path.display()))?;
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        let l = &m.latency_ms;

        writeln!(f)?;
        writeln!(f, "{}", " ======== TEST RESULTS ======== ".bold().white().on_blue())?;
        row(f, "Scenario", &self.name)?;
        row(f, "Target", &self.target_url)?;
        row(f, "Timestamp", &self.timestamp)?;
        row(f, "Duration", &format!("{:.1}s", self.duration_secs))?;
        row(f, "Peak VUs", &self.peak_vus.to_string())?;
        row(
            f,
            "Host",
            &format!(
                "{} cores, {} MiB free of {} MiB",
                self.host.cpu_cores,
                self.host.available_memory_mib(),
                self.host.total_memory_mib()
            ),
        )?;
        writeln!(f)?;
        row(f, "Total requests", &m.total_requests.to_string())?;
        row(f, "Successful requests", &m.successful_requests.to_string().green().to_string())?;
        row(f, "Failed requests", &m.failed_requests.to_string().red().to_string())?;
        row(f, "Success ratio", &format!("{:.2}%", m.success_ratio * 100.0))?;
        row(f, "Requests per second", &format!("{:.2}", m.throughput))?;
        row(
            f,
            "http_req_duration",
            &format!(
                "min={:.2}ms avg={:.2}ms med={:.2}ms p(90)={:.2}ms p(95)={:.2}ms p(99)={:.2}ms max={:.2}ms",
                l.min, l.avg, l.med, l.p90, l.p95, l.p99, l.max
            ),
        )?;

        writeln!(f)?;
        writeln!(f, "{}", " ======== STATUS BREAKDOWN ======== ".bold().white().on_blue())?;
        for (status, count) in &m.status_counts {
            writeln!(f, "  • {}: {}", status.bold(), count)?;
        }

        if !self.thresholds.is_empty() {
            writeln!(f)?;
            writeln!(f, "{}", " ======== THRESHOLDS ======== ".bold().white().on_blue())?;
            for t in &self.thresholds {
                let mark = if t.passed { "✓".green() } else { "✗".red() };
                writeln!(f, "  {mark} {} (observed {:.2})", t.expression, t.observed)?;
            }
        }

        if self.forced_stops > 0 {
            writeln!(
                f,
                "\n{} {} virtual users outlived the graceful stop period and were aborted",
                "warning:".yellow().bold(),
                self.forced_stops
            )?;
        }
        if self.interrupted {
            writeln!(
                f,
                "\n{} run was interrupted before its configured duration",
                "warning:".yellow().bold()
            )?;
        }

        writeln!(f)?;
        if self.passed {
            return writeln!(f, "{}", "All thresholds passed".green().bold());
        }
        for t in self.thresholds.iter().filter(|t| !t.passed) {
            writeln!(
                f,
                "{} threshold '{}' crossed: observed {:.2}",
                "FAILED".red().bold(),
                t.expression,
                t.observed
            )?;
        }
        Ok(())
    }
}

fn row(f: &mut fmt::Formatter<'_>, label: &str, value: &str) -> fmt::Result {
    writeln!(f, "  {:<22}: {}", label.bold(), value)
}

/// Resolved view of a config, printed by `inspect`.
pub struct Plan<'a>(pub &'a TestConfig);

impl fmt::Display for Plan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.0;
        writeln!(f, "{}", " ======== TEST PLAN ======== ".bold().white().on_blue())?;
        row(f, "Scenario", &config.name)?;
        row(f, "Target", &config.url)?;
        match &config.profile {
            LoadProfile::Constant { vus, duration } => {
                row(f, "Load", &format!("{vus} VUs for {}", format_duration(*duration)))?;
            }
            LoadProfile::Ramping {
                start_vus,
                stages,
                interpolation,
            } => {
                row(
                    f,
                    "Load",
                    &format!("{interpolation:?} ramp from {start_vus} VUs, {} stages", stages.len()),
                )?;
                for (i, stage) in stages.iter().enumerate() {
                    writeln!(
                        f,
                        "    stage {}: -> {} VUs over {}",
                        i + 1,
                        stage.target,
                        format_duration(stage.duration)
                    )?;
                }
            }
        }
        row(f, "Total duration", &format_duration(config.profile.total_duration()).to_string())?;
        row(f, "Max VUs", &config.profile.max_vus().to_string())?;
        row(f, "Sleep", &format_duration(config.sleep).to_string())?;
        row(f, "Request timeout", &format_duration(config.timeout).to_string())?;
        row(f, "Graceful stop", &format_duration(config.graceful_stop).to_string())?;
        for t in &config.thresholds {
            writeln!(f, "  threshold {}", t.label())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dsl_model::DslConfig;
    use crate::models::metrics::LatencyStats;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn outcome(thresholds: Vec<ThresholdResult>) -> RunOutcome {
        RunOutcome {
            metrics: Metrics {
                total_requests: 10,
                successful_requests: 9,
                failed_requests: 1,
                success_ratio: 0.9,
                throughput: 5.0,
                latency_ms: LatencyStats {
                    min: 1.0,
                    avg: 2.0,
                    med: 2.0,
                    p90: 3.0,
                    p95: 4.0,
                    p99: 5.0,
                    max: 6.0,
                },
                status_counts: BTreeMap::from([("200".to_string(), 9), ("TIMEOUT".to_string(), 1)]),
            },
            thresholds,
            elapsed: Duration::from_secs(2),
            peak_vus: 4,
            forced_stops: 0,
            interrupted: false,
        }
    }

    fn config() -> TestConfig {
        serde_json::from_str::<DslConfig>(
            r#"{ "name": "files", "url": "http://localhost:3000/files", "vus": 4, "duration": "2s" }"#,
        )
        .unwrap()
        .validate()
        .unwrap()
    }

    fn host() -> HostInfo {
        HostInfo {
            cpu_cores: 8,
            total_memory_bytes: 16 << 30,
            available_memory_bytes: 8 << 30,
        }
    }

    #[test]
    fn failing_threshold_sets_exit_code_and_report_line() {
        colored::control::set_override(false);
        let report = Report::new(
            &config(),
            outcome(vec![
                ThresholdResult {
                    expression: "http_req_duration: p(95) < 100".into(),
                    observed: 180.5,
                    passed: false,
                },
                ThresholdResult {
                    expression: "checks: rate > 0.5".into(),
                    observed: 0.9,
                    passed: true,
                },
            ]),
            host(),
        );

        assert!(!report.passed);
        assert_eq!(report.exit_code(), EXIT_THRESHOLDS_FAILED);
        let text = report.to_string();
        assert!(text.contains("FAILED threshold 'http_req_duration: p(95) < 100' crossed: observed 180.50"));
        assert!(!text.contains("threshold 'checks: rate > 0.5' crossed"));
        assert!(text.contains("TIMEOUT: 1"));
    }

    #[test]
    fn passing_run_exits_zero() {
        let report = Report::new(&config(), outcome(vec![]), host());
        assert!(report.passed);
        assert_eq!(report.exit_code(), EXIT_OK);
    }

    #[test]
    fn exports_json_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        Report::new(&config(), outcome(vec![]), host())
            .export_json(&path)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["name"], "files");
        assert_eq!(value["metrics"]["total_requests"], 10);
        assert_eq!(value["metrics"]["status_counts"]["TIMEOUT"], 1);
        assert_eq!(value["passed"], true);
        assert_eq!(value["host"]["cpu_cores"], 8);
    }

    #[test]
    fn plan_lists_stages_and_thresholds() {
        colored::control::set_override(false);
        let config = serde_json::from_str::<DslConfig>(
            r#"{ "url": "http://localhost:3000/files",
                 "stages": [{ "duration": "30s", "target": 10000 }],
                 "thresholds": { "http_req_duration": ["p(99) < 500"] } }"#,
        )
        .unwrap()
        .validate()
        .unwrap();

        let text = Plan(&config).to_string();
        assert!(text.contains("stage 1: -> 10000 VUs over 30s"));
        assert!(text.contains("threshold http_req_duration: p(99) < 500"));
        assert!(text.contains("Linear ramp from 0 VUs, 1 stages"));
    }
}
