//! Simulation controller.

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use trcalc_calculator::{Calculator, DisplayView, FocusState};
use trcalc_common::{Amount, Modifier};
use trcalc_fx::RefreshOutcome;

use crate::metrics::SimulationMetrics;
use crate::scenario::{parse_command, AssertCondition, Scenario, ScenarioStep};

/// Drives a calculator session from scripted or typed events.
pub struct SimulationController {
    calc: Calculator,
    metrics: Mutex<SimulationMetrics>,
}

impl SimulationController {
    pub fn new(calc: Calculator) -> Self {
        Self {
            calc,
            metrics: Mutex::new(SimulationMetrics::new()),
        }
    }

    /// Run every step. Stops at the first failed assertion.
    pub async fn run_scenario(&self, scenario: &Scenario) -> anyhow::Result<()> {
        info!(
            name = %scenario.name,
            description = %scenario.description,
            steps = scenario.steps.len(),
            "Running scenario"
        );

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(step)
                .await
                .map_err(|e| anyhow::anyhow!("step {} ({:?}): {}", index + 1, step, e))?;
        }

        info!(name = %scenario.name, "Scenario passed");
        Ok(())
    }

    /// Read commands from stdin until EOF or `quit`.
    pub async fn run_interactive(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        print_view(&self.calc.view());

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            match line {
                "quit" | "exit" => break,
                "history" => {
                    for entry in self.calc.history() {
                        println!(
                            "{:>6}  {} {} -> {} {}",
                            entry.age_label(trcalc_common::now()),
                            entry.input_amount,
                            entry.from_currency,
                            entry.output_amount,
                            entry.to_currency
                        );
                    }
                    continue;
                }
                _ => {}
            }

            match parse_command(line) {
                Ok(Some(step)) => {
                    if let Err(e) = self.execute_step(&step).await {
                        warn!(error = %e, "Step failed");
                    }
                    print_view(&self.calc.view());
                }
                Ok(None) => {}
                Err(e) => println!("{e}"),
            }
        }
        Ok(())
    }

    /// Execute one step against the session.
    pub async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        debug!(?step, "Executing step");
        self.metrics.lock().record_step();

        match step {
            ScenarioStep::Digits { digits } => {
                for c in digits.chars() {
                    let digit = c
                        .to_digit(10)
                        .ok_or_else(|| anyhow::anyhow!("not a digit: {c:?}"))?;
                    if !self.calc.press_digit(digit as u8) {
                        self.metrics.lock().ignored_keystrokes += 1;
                    }
                }
            }
            ScenarioStep::Backspace => self.calc.backspace(),
            ScenarioStep::Clear => self.calc.clear(),
            ScenarioStep::Equals { modifier } => {
                let modifier = modifier
                    .as_ref()
                    .map(|(label, percent)| Modifier::new(label.clone(), *percent));
                let entry = self.calc.equals(modifier);
                self.metrics.lock().record_entry(entry.is_some());
            }
            ScenarioStep::Multiplier { label, percent } => {
                self.calc
                    .apply_multiplier(&Modifier::new(label.clone(), *percent));
            }
            ScenarioStep::QuickValue { value } => {
                let amount = Amount::new(*value)
                    .ok_or_else(|| anyhow::anyhow!("quick value {value} is out of range"))?;
                self.calc.select_quick_value(amount);
            }
            ScenarioStep::Swap => self.calc.swap_direction(),
            ScenarioStep::Hide => {
                let entry = self.calc.visibility_changed(false);
                self.metrics.lock().record_entry(entry.is_some());
            }
            ScenarioStep::Show => {
                self.calc.visibility_changed(true);
            }
            ScenarioStep::SetAutoReset { enabled } => {
                let enabled = *enabled;
                self.calc.update_settings(|s| {
                    s.auto_reset = enabled;
                    Ok(())
                })?;
            }
            ScenarioStep::SetTarget { currency } => self.calc.set_target_currency(*currency)?,
            ScenarioStep::SetTheme { theme } => {
                let theme = *theme;
                self.calc.update_settings(|s| {
                    s.set_theme(theme);
                    Ok(())
                })?;
            }
            ScenarioStep::ClearHistory => self.calc.clear_history(),
            ScenarioStep::RefreshRates => {
                if let RefreshOutcome::Failed(reason) = self.calc.refresh_rates().await {
                    warn!(%reason, "Rate refresh failed");
                    self.metrics.lock().failed_refreshes += 1;
                }
            }
            ScenarioStep::Assert { condition } => {
                let result = self.check(condition);
                self.metrics.lock().record_assertion(result.is_ok());
                result?;
            }
        }

        Ok(())
    }

    fn check(&self, condition: &AssertCondition) -> anyhow::Result<()> {
        let (expected, actual) = match condition {
            AssertCondition::AmountEquals { amount } => {
                (amount.to_string(), self.calc.amount().value().to_string())
            }
            AssertCondition::ConvertedEquals { amount } => {
                (amount.to_string(), self.calc.view().converted.to_string())
            }
            AssertCondition::HistoryLength { len } => {
                (len.to_string(), self.calc.history().len().to_string())
            }
            AssertCondition::LatestInputEquals { amount } => (
                amount.to_string(),
                self.calc
                    .history()
                    .first()
                    .map(|e| e.input_amount.value().to_string())
                    .unwrap_or_else(|| "<empty>".to_string()),
            ),
            AssertCondition::FocusState { state } => (
                state.to_ascii_lowercase(),
                focus_name(self.calc.focus_state()).to_string(),
            ),
        };

        if expected != actual {
            anyhow::bail!(
                "Assertion failed: {:?} expected {}, got {}",
                condition,
                expected,
                actual
            );
        }
        debug!(?condition, "Assertion passed");
        Ok(())
    }

    pub fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.lock().clone()
    }
}

fn focus_name(state: FocusState) -> &'static str {
    match state {
        FocusState::Active => "active",
        FocusState::BackgroundedPendingReset => "backgrounded",
        FocusState::ResetArmed => "armed",
    }
}

fn print_view(view: &DisplayView) {
    println!(
        "{}{} {} = {}{} {}   [{}] auto-reset: {:?}  history: {}",
        view.from_symbol,
        view.input,
        view.from_currency,
        view.to_symbol,
        view.output,
        view.to_currency,
        view.rate_info,
        view.auto_reset,
        view.history_len
    );
    if let Some(error) = &view.rate_error {
        println!("  rate error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::BUILT_IN;
    use std::sync::Arc;
    use trcalc_calculator::CalculatorConfig;
    use trcalc_common::{FileStore, MemoryStore};
    use trcalc_fx::{FallbackRateProvider, RateCacheConfig};

    fn controller() -> SimulationController {
        SimulationController::new(Calculator::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(FallbackRateProvider),
            RateCacheConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_built_in_scenarios_pass() {
        for name in BUILT_IN {
            let controller = controller();
            let scenario = Scenario::load(name).unwrap();
            controller.run_scenario(&scenario).await.unwrap();
            assert!(controller.get_metrics().all_passed());
        }
    }

    #[tokio::test]
    async fn test_failed_assertion_reported() {
        let controller = controller();
        let scenario = Scenario {
            name: "wrong".to_string(),
            description: String::new(),
            steps: vec![
                ScenarioStep::Digits {
                    digits: "7".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::AmountEquals { amount: 8 },
                },
            ],
        };

        let err = controller.run_scenario(&scenario).await.unwrap_err();
        assert!(err.to_string().contains("expected 8, got 7"));
        assert_eq!(controller.get_metrics().assertions_failed, 1);
    }

    #[tokio::test]
    async fn test_cap_counts_ignored_keystrokes() {
        let controller = controller();
        controller
            .execute_step(&ScenarioStep::Digits {
                digits: "99999999999".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(controller.get_metrics().ignored_keystrokes, 2);
        assert_eq!(controller.calc.amount().value(), 999_999_999);
    }

    #[tokio::test]
    async fn test_refresh_then_history_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CalculatorConfig::default();
        config.data_dir = Some(dir.path().to_path_buf());

        let controller = SimulationController::new(Calculator::open(&config).unwrap());
        controller
            .execute_step(&ScenarioStep::RefreshRates)
            .await
            .unwrap();
        controller
            .execute_step(&ScenarioStep::QuickValue { value: 10 })
            .await
            .unwrap();
        controller
            .execute_step(&ScenarioStep::Equals { modifier: None })
            .await
            .unwrap();

        let reopened = Calculator::with_parts(
            Arc::new(FileStore::open(dir.path()).unwrap()),
            Arc::new(FallbackRateProvider),
            RateCacheConfig::default(),
        );
        assert_eq!(reopened.history().len(), 1);
        assert!(!reopened.rates().is_stale(trcalc_common::now()));
    }
}
