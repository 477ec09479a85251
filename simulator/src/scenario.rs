//! Simulation scenarios.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use trcalc_calculator::Theme;
use trcalc_common::CurrencyCode;

/// A scripted sequence of calculator events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Type a run of digits.
    Digits { digits: String },
    Backspace,
    Clear,
    /// Commit, optionally with a modifier.
    Equals {
        #[serde(default)]
        modifier: Option<(String, i32)>,
    },
    /// Apply a percentage to the in-progress amount.
    Multiplier { label: String, percent: i32 },
    QuickValue { value: u64 },
    Swap,
    /// App goes to the background.
    Hide,
    /// App comes back.
    Show,
    SetAutoReset { enabled: bool },
    SetTarget { currency: CurrencyCode },
    SetTheme { theme: Theme },
    ClearHistory,
    RefreshRates,
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertCondition {
    /// The in-progress amount.
    AmountEquals { amount: u64 },
    /// The converted counterpart of the in-progress amount.
    ConvertedEquals { amount: u64 },
    HistoryLength { len: usize },
    /// Input amount of the newest history entry.
    LatestInputEquals { amount: u64 },
    /// `active`, `backgrounded` or `armed`.
    FocusState { state: String },
}

/// Names of the built-in scenarios.
pub const BUILT_IN: &[&str] = &[
    "basic-conversion",
    "reverse-conversion",
    "multiplier",
    "background-excursion",
    "history-overflow",
];

fn digits(s: &str) -> ScenarioStep {
    ScenarioStep::Digits {
        digits: s.to_string(),
    }
}

fn assert(condition: AssertCondition) -> ScenarioStep {
    ScenarioStep::Assert { condition }
}

impl Scenario {
    /// Load a built-in scenario by name, or a JSON scenario from a path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "basic-conversion" => Ok(Self::basic_conversion()),
            "reverse-conversion" => Ok(Self::reverse_conversion()),
            "multiplier" => Ok(Self::multiplier()),
            "background-excursion" => Ok(Self::background_excursion()),
            "history-overflow" => Ok(Self::history_overflow()),
            path if path.ends_with(".json") || Path::new(path).is_file() => Self::from_file(path),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Read a JSON scenario.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// 100 USD to TRY at the fallback rate, then commit.
    fn basic_conversion() -> Self {
        Self {
            name: "basic-conversion".to_string(),
            description: "Type 100 USD, convert to TRY and commit".to_string(),
            steps: vec![
                digits("100"),
                assert(AssertCondition::ConvertedEquals { amount: 3450 }),
                ScenarioStep::Equals { modifier: None },
                assert(AssertCondition::AmountEquals { amount: 0 }),
                assert(AssertCondition::HistoryLength { len: 1 }),
                ScenarioStep::Equals { modifier: None },
                assert(AssertCondition::HistoryLength { len: 1 }),
            ],
        }
    }

    /// TRY back to USD divides by the rate.
    fn reverse_conversion() -> Self {
        Self {
            name: "reverse-conversion".to_string(),
            description: "Swap direction and convert 3450 TRY to USD".to_string(),
            steps: vec![
                ScenarioStep::Swap,
                digits("3450"),
                assert(AssertCondition::ConvertedEquals { amount: 100 }),
                ScenarioStep::Swap,
                ScenarioStep::Swap,
                assert(AssertCondition::AmountEquals { amount: 3450 }),
                ScenarioStep::Swap,
            ],
        }
    }

    /// Add and remove KDV, then commit with a modifier.
    fn multiplier() -> Self {
        Self {
            name: "multiplier".to_string(),
            description: "Apply +KDV and -KDV and commit with a modifier".to_string(),
            steps: vec![
                digits("100"),
                ScenarioStep::Multiplier {
                    label: "+KDV".to_string(),
                    percent: 18,
                },
                assert(AssertCondition::AmountEquals { amount: 118 }),
                ScenarioStep::Multiplier {
                    label: "-KDV".to_string(),
                    percent: -18,
                },
                assert(AssertCondition::AmountEquals { amount: 100 }),
                assert(AssertCondition::HistoryLength { len: 0 }),
                ScenarioStep::Equals {
                    modifier: Some(("+OTV25".to_string(), 25)),
                },
                assert(AssertCondition::LatestInputEquals { amount: 125 }),
            ],
        }
    }

    /// Hide with a pending amount, come back, type a digit.
    fn background_excursion() -> Self {
        Self {
            name: "background-excursion".to_string(),
            description: "Snapshot on hide, deferred reset on the next digit".to_string(),
            steps: vec![
                ScenarioStep::SetAutoReset { enabled: true },
                digits("200"),
                ScenarioStep::Hide,
                assert(AssertCondition::HistoryLength { len: 1 }),
                assert(AssertCondition::LatestInputEquals { amount: 200 }),
                assert(AssertCondition::AmountEquals { amount: 200 }),
                ScenarioStep::Hide,
                assert(AssertCondition::HistoryLength { len: 1 }),
                ScenarioStep::Show,
                assert(AssertCondition::FocusState {
                    state: "armed".to_string(),
                }),
                assert(AssertCondition::AmountEquals { amount: 200 }),
                digits("5"),
                assert(AssertCondition::AmountEquals { amount: 5 }),
                assert(AssertCondition::FocusState {
                    state: "active".to_string(),
                }),
            ],
        }
    }

    /// 51 commits keep the 50 newest.
    fn history_overflow() -> Self {
        let mut steps = Vec::with_capacity(105);
        for value in 1..=51 {
            steps.push(ScenarioStep::QuickValue { value });
            steps.push(ScenarioStep::Equals { modifier: None });
        }
        steps.push(assert(AssertCondition::HistoryLength { len: 50 }));
        steps.push(assert(AssertCondition::LatestInputEquals { amount: 51 }));
        Self {
            name: "history-overflow".to_string(),
            description: "Commit 51 conversions into a log of 50".to_string(),
            steps,
        }
    }
}

/// Parse one interactive command into a step. `Ok(None)` for blank lines.
///
/// Commands: a run of digits, `b`, `c`, `=`, `= <label> <percent>`,
/// `m <label> <percent>`, `q <value>`, `swap`, `hide`, `show`,
/// `auto on|off`, `target <code>`, `theme <light|dark|system>`,
/// `clear-history`, `refresh`.
pub fn parse_command(line: &str) -> anyhow::Result<Option<ScenarioStep>> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let step = match (cmd, args.as_slice()) {
        (d, []) if d.chars().all(|c| c.is_ascii_digit()) => digits(d),
        ("b" | "back", []) => ScenarioStep::Backspace,
        ("c" | "clear", []) => ScenarioStep::Clear,
        ("=", []) => ScenarioStep::Equals { modifier: None },
        ("=", [label, percent]) => ScenarioStep::Equals {
            modifier: Some((label.to_string(), percent.parse()?)),
        },
        ("m", [label, percent]) => ScenarioStep::Multiplier {
            label: label.to_string(),
            percent: percent.parse()?,
        },
        ("q", [value]) => ScenarioStep::QuickValue {
            value: value.parse()?,
        },
        ("swap", []) => ScenarioStep::Swap,
        ("hide", []) => ScenarioStep::Hide,
        ("show", []) => ScenarioStep::Show,
        ("auto", ["on"]) => ScenarioStep::SetAutoReset { enabled: true },
        ("auto", ["off"]) => ScenarioStep::SetAutoReset { enabled: false },
        ("target", [code]) => ScenarioStep::SetTarget {
            currency: code.parse()?,
        },
        ("theme", [name]) => ScenarioStep::SetTheme {
            theme: name.parse()?,
        },
        ("clear-history", []) => ScenarioStep::ClearHistory,
        ("refresh", []) => ScenarioStep::RefreshRates,
        _ => anyhow::bail!("Unknown command: {}", line.trim()),
    };
    Ok(Some(step))
}
