//! Invocation outcome statistics
//!
//! Each [`Router`](crate::router::Router) owns (or shares through `Arc`) one
//! [`StatsCounter`]. Counters only ever grow; snapshots are plain copies.

use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Kind of outcome being counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// An invocation produced content
    Success,
    /// An invocation gave up and returned nothing
    Failure,
    /// Moved on to the next quality tier
    Switch,
    /// Retried after an overload
    Retry,
    /// Cropped the prompt after a token-limit failure
    Crop,
}

impl StatKind {
    /// All counted kinds, in display order
    pub const ALL: [StatKind; 5] = [
        StatKind::Success,
        StatKind::Failure,
        StatKind::Switch,
        StatKind::Retry,
        StatKind::Crop,
    ];

    /// Human readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "Successful LLM invocations",
            Self::Failure => "Failed LLM invocations",
            Self::Switch => "Switches to the next quality tier",
            Self::Retry => "Retries after overload",
            Self::Crop => "Prompt crops after token limit",
        }
    }

    /// Single-character progress symbol
    #[must_use]
    pub fn symbol(&self) -> char {
        match self {
            Self::Success => '>',
            Self::Failure => '!',
            Self::Switch => '+',
            Self::Retry => '?',
            Self::Crop => '-',
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Switch => 2,
            Self::Retry => 3,
            Self::Crop => 4,
        }
    }
}

const TOTAL_LABEL: &str = "Total LLM invocations";
const TOTAL_SYMBOL: char = '=';

/// One row of a [`StatsSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    /// Human readable label
    pub label: &'static str,
    /// Single-character symbol
    pub symbol: char,
    /// Count at snapshot time
    pub count: u64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Rows in display order, with the total last when requested
    pub entries: Vec<StatEntry>,
}

impl StatsSnapshot {
    /// Count for a given symbol, if present
    #[must_use]
    pub fn count_for(&self, symbol: char) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.symbol == symbol)
            .map(|e| e.count)
    }
}

/// Thread-safe outcome counters
#[derive(Debug, Default)]
pub struct StatsCounter {
    counters: [AtomicU64; 5],
}

impl StatsCounter {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outcome
    pub fn record(&self, kind: StatKind) {
        self.counters[kind.index()].fetch_add(1, Ordering::Relaxed);
        trace!(symbol = %kind.symbol(), "{}", kind.label());
    }

    /// Current value of one counter
    #[must_use]
    pub fn get(&self, kind: StatKind) -> u64 {
        self.counters[kind.index()].load(Ordering::Relaxed)
    }

    /// Copy of all counters, optionally with `total = success + failure`
    #[must_use]
    pub fn snapshot(&self, include_total: bool) -> StatsSnapshot {
        let mut entries: Vec<StatEntry> = StatKind::ALL
            .iter()
            .map(|kind| StatEntry {
                label: kind.label(),
                symbol: kind.symbol(),
                count: self.get(*kind),
            })
            .collect();

        if include_total {
            entries.push(StatEntry {
                label: TOTAL_LABEL,
                symbol: TOTAL_SYMBOL,
                count: self.get(StatKind::Success).saturating_add(self.get(StatKind::Failure)),
            });
        }

        StatsSnapshot { entries }
    }

    /// One-line legend of the progress symbols
    #[must_use]
    pub fn symbols_legend(&self) -> String {
        StatKind::ALL
            .iter()
            .map(|k| format!("{} = {}", k.symbol(), k.label()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Compact single-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        self.snapshot(true)
            .entries
            .iter()
            .map(|e| format!("{} {}", e.symbol, e.count))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Multi-line table
    #[must_use]
    pub fn details(&self) -> String {
        let snapshot = self.snapshot(true);
        let width = snapshot
            .entries
            .iter()
            .map(|e| e.label.len())
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        for entry in &snapshot.entries {
            let _ = writeln!(
                out,
                "{:<width$}  {}  {:>8}",
                entry.label,
                entry.symbol,
                entry.count,
                width = width
            );
        }
        out
    }
}
