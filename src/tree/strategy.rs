//! The `<strategy>` modifier.

use std::collections::BTreeMap;

use crate::backend::Compression;
use crate::error::WriterError;
use crate::scheduler::Phase;

/// When a node is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Init,
    Step,
    Final,
    /// Written by a later tool; the node is only annotated
    Postrun,
}

impl Mode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INIT" => Some(Mode::Init),
            "STEP" => Some(Mode::Step),
            "FINAL" => Some(Mode::Final),
            "POSTRUN" => Some(Mode::Postrun),
            _ => None,
        }
    }

    /// Scheduler phase, `None` for nodes that are never scheduled.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Mode::Init => Some(Phase::Init),
            Mode::Step => Some(Phase::Step),
            Mode::Final => Some(Phase::Final),
            Mode::Postrun => None,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn invalid(name: &str, value: &str) -> WriterError {
    WriterError::Setup(format!("invalid strategy {} '{}'", name, value))
}

/// Phase, trigger, growth and failure settings of the enclosing node.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub mode: Mode,
    pub trigger: Option<String>,
    /// 1-based growth axis
    pub grows: Option<usize>,
    pub can_fail: Option<bool>,
    pub compression: Option<bool>,
    /// Deflate level
    pub rate: Option<u32>,
    pub shuffle: Option<bool>,
    /// Character data of the tag, used by `POSTRUN`
    pub content: String,
}

impl Strategy {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            trigger: None,
            grows: None,
            can_fail: None,
            compression: None,
            rate: None,
            shuffle: None,
            content: String::new(),
        }
    }

    pub fn from_attrs(attrs: &BTreeMap<String, String>, content: &str) -> Result<Self, WriterError> {
        let mode = attrs
            .get("mode")
            .ok_or_else(|| WriterError::Setup("strategy without a mode".to_string()))?;
        let mut strategy = Self::new(Mode::from_str(mode).ok_or_else(|| invalid("mode", mode))?);
        strategy.trigger = attrs
            .get("trigger")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(g) = attrs.get("grows") {
            strategy.grows = Some(g.trim().parse().map_err(|_| invalid("grows", g))?);
        }
        if let Some(c) = attrs.get("canfail") {
            strategy.can_fail = Some(parse_bool(c).ok_or_else(|| invalid("canfail", c))?);
        }
        if let Some(c) = attrs.get("compression") {
            strategy.compression = Some(parse_bool(c).ok_or_else(|| invalid("compression", c))?);
        }
        if let Some(r) = attrs.get("rate") {
            let rate: u32 = r.trim().parse().map_err(|_| invalid("rate", r))?;
            strategy.rate = Some(rate.min(9));
        }
        if let Some(s) = attrs.get("shuffle") {
            strategy.shuffle = Some(parse_bool(s).ok_or_else(|| invalid("shuffle", s))?);
        }
        strategy.content = content.trim().to_string();
        Ok(strategy)
    }

    pub fn phase(&self) -> Option<Phase> {
        self.mode.phase()
    }

    /// Compression of the field this strategy modifies.
    pub fn field_compression(&self, default: Compression) -> Compression {
        if self.compression != Some(true) {
            return Compression {
                enabled: false,
                ..default
            };
        }
        Compression {
            enabled: true,
            level: self.rate.unwrap_or(default.level),
            shuffle: self.shuffle.unwrap_or(default.shuffle),
        }
    }
}
