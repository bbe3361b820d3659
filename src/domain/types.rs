use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    #[serde(rename = "SSE")]
    Sse,
    #[serde(rename = "SZSE")]
    Szse,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Sse => write!(f, "SSE"),
            Exchange::Szse => write!(f, "SZSE"),
        }
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SSE" => Ok(Exchange::Sse),
            "SZSE" => Ok(Exchange::Szse),
            other => Err(format!("unknown exchange: {other}")),
        }
    }
}

impl Exchange {
    /// Infers an exchange from a 6-digit A-share symbol's leading digit,
    /// used by the radar scanner's CUSTOM universe when exchange is omitted.
    pub fn infer_from_symbol(symbol: &str) -> Exchange {
        match symbol.chars().next() {
            Some('6') | Some('9') => Exchange::Sse,
            _ => Exchange::Szse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "CN_A")]
    CnA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adj {
    #[serde(rename = "RAW")]
    Raw,
    #[serde(rename = "QFQ")]
    Qfq,
    #[serde(rename = "HFQ")]
    Hfq,
}

impl fmt::Display for Adj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adj::Raw => write!(f, "RAW"),
            Adj::Qfq => write!(f, "QFQ"),
            Adj::Hfq => write!(f, "HFQ"),
        }
    }
}

impl FromStr for Adj {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RAW" => Ok(Adj::Raw),
            "QFQ" => Ok(Adj::Qfq),
            "HFQ" => Ok(Adj::Hfq),
            other => Err(format!("unknown adj: {other}")),
        }
    }
}

impl Default for Adj {
    fn default() -> Self {
        Adj::Qfq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "RUNNING" => Ok(TaskStatus::Running),
            "SUCCEEDED" => Ok(TaskStatus::Succeeded),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskStatus::Pass => "PASS",
            RiskStatus::Warn => "WARN",
            RiskStatus::Fail => "FAIL",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RiskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(RiskStatus::Pass),
            "WARN" => Ok(RiskStatus::Warn),
            "FAIL" => Ok(RiskStatus::Fail),
            other => Err(format!("unknown risk status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Zero-pads a raw symbol to the canonical 6-digit A-share form.
pub fn normalize_symbol(symbol: &str) -> String {
    format!("{:0>6}", symbol.trim())
}
