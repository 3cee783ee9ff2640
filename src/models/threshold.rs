use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::ThresholdParseError;

static EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(avg|min|max|med|count|rate|p\(\s*(-?\d+(?:\.\d+)?)\s*\))\s*(<=|>=|==|!=|<|>)\s*(-?\d+(?:\.\d+)?)\s*$",
    )
    .expect("threshold expression regex is valid")
});

/// Metrics a threshold can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HttpReqDuration,
    HttpReqFailed,
    HttpReqs,
    Checks,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::HttpReqDuration => "http_req_duration",
            Metric::HttpReqFailed => "http_req_failed",
            Metric::HttpReqs => "http_reqs",
            Metric::Checks => "checks",
        }
    }

    fn supports(&self, stat: &Stat) -> bool {
        match self {
            Metric::HttpReqDuration => matches!(
                stat,
                Stat::Avg | Stat::Min | Stat::Max | Stat::Med | Stat::Percentile(_)
            ),
            Metric::HttpReqFailed | Metric::Checks => matches!(stat, Stat::Rate),
            Metric::HttpReqs => matches!(stat, Stat::Count | Stat::Rate),
        }
    }
}

impl FromStr for Metric {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "http_req_duration" => Ok(Metric::HttpReqDuration),
            "http_req_failed" => Ok(Metric::HttpReqFailed),
            "http_reqs" => Ok(Metric::HttpReqs),
            "checks" => Ok(Metric::Checks),
            other => Err(ThresholdParseError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stat {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    /// Percentile in 0..=100, as written in `p(95)`.
    Percentile(f64),
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Avg => f.write_str("avg"),
            Stat::Min => f.write_str("min"),
            Stat::Max => f.write_str("max"),
            Stat::Med => f.write_str("med"),
            Stat::Count => f.write_str("count"),
            Stat::Rate => f.write_str("rate"),
            Stat::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparator {
    pub fn holds(&self, observed: f64, expected: f64) -> bool {
        match self {
            Comparator::Lt => observed < expected,
            Comparator::Le => observed <= expected,
            Comparator::Gt => observed > expected,
            Comparator::Ge => observed >= expected,
            Comparator::Eq => observed == expected,
            Comparator::Ne => observed != expected,
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Comparator::Lt),
            "<=" => Some(Comparator::Le),
            ">" => Some(Comparator::Gt),
            ">=" => Some(Comparator::Ge),
            "==" => Some(Comparator::Eq),
            "!=" => Some(Comparator::Ne),
            _ => None,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        };
        f.write_str(s)
    }
}

/// A parsed pass/fail assertion such as `http_req_duration: p(95) < 100`.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub stat: Stat,
    pub comparator: Comparator,
    pub value: f64,
    /// Expression as written in the config.
    pub source: String,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        let metric: Metric = metric.parse()?;
        let caps = EXPRESSION
            .captures(expression)
            .ok_or_else(|| ThresholdParseError::Malformed(expression.to_string()))?;

        let stat = match (&caps[1], caps.get(2)) {
            (_, Some(p)) => {
                let p: f64 = p
                    .as_str()
                    .parse()
                    .map_err(|_| ThresholdParseError::Malformed(expression.to_string()))?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(ThresholdParseError::PercentileOutOfRange(p));
                }
                Stat::Percentile(p)
            }
            ("avg", None) => Stat::Avg,
            ("min", None) => Stat::Min,
            ("max", None) => Stat::Max,
            ("med", None) => Stat::Med,
            ("count", None) => Stat::Count,
            ("rate", None) => Stat::Rate,
            _ => return Err(ThresholdParseError::Malformed(expression.to_string())),
        };

        if !metric.supports(&stat) {
            return Err(ThresholdParseError::UnsupportedStat {
                metric: metric.name().to_string(),
                stat: stat.to_string(),
            });
        }

        let comparator = Comparator::parse(&caps[3])
            .ok_or_else(|| ThresholdParseError::Malformed(expression.to_string()))?;
        let value: f64 = caps[4]
            .parse()
            .map_err(|_| ThresholdParseError::Malformed(expression.to_string()))?;

        Ok(Self {
            metric,
            stat,
            comparator,
            value,
            source: expression.trim().to_string(),
        })
    }

    /// `metric: expression`, used in reports.
    pub fn label(&self) -> String {
        format!("{}: {}", self.metric, self.source)
    }
}
