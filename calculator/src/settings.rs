//! Persisted user settings.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use trcalc_common::store::{keys, Versioned};
use trcalc_common::{Amount, CurrencyCode, Modifier, PresetId, Result, TrcalcError};

/// Colour theme preference. Resolution happens in the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl std::str::FromStr for Theme {
    type Err = TrcalcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(TrcalcError::invalid_setting(
                "theme",
                format!("unknown theme {other:?}"),
            )),
        }
    }
}

/// A named percentage the user can apply with one tap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierPreset {
    pub id: PresetId,
    pub label: String,
    #[serde(alias = "value")]
    pub percent: i32,
}

impl MultiplierPreset {
    pub fn new(id: impl Into<PresetId>, label: impl Into<String>, percent: i32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            percent,
        }
    }

    pub fn to_modifier(&self) -> Modifier {
        Modifier::new(self.label.clone(), self.percent)
    }
}

fn default_multipliers() -> Vec<MultiplierPreset> {
    vec![
        MultiplierPreset::new("kdv-add", "+KDV", 18),
        MultiplierPreset::new("kdv-remove", "-KDV", -18),
        MultiplierPreset::new("otv-25", "+OTV25", 25),
    ]
}

fn default_quick_values() -> Vec<Amount> {
    [50, 100, 500, 1000]
        .into_iter()
        .map(Amount::saturating)
        .collect()
}

fn deserialize_target<'de, D>(deserializer: D) -> std::result::Result<CurrencyCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = CurrencyCode::deserialize(deserializer)?;
    if code.is_pivot() {
        return Err(serde::de::Error::custom("target currency cannot be USD"));
    }
    Ok(code)
}

/// Quick values are kept ascending and unique however they were stored.
fn deserialize_quick_values<'de, D>(deserializer: D) -> std::result::Result<Vec<Amount>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut values = Vec::<Amount>::deserialize(deserializer)?;
    normalize_quick_values(&mut values);
    Ok(values)
}

fn normalize_quick_values(values: &mut Vec<Amount>) {
    values.retain(|v| !v.is_zero());
    values.sort_unstable();
    values.dedup();
}

/// User settings. Missing fields take their defaults; a USD target makes
/// the whole record invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(deserialize_with = "deserialize_target")]
    pub target_currency: CurrencyCode,
    pub auto_reset: bool,
    pub first_visit: bool,
    pub is_reversed: bool,
    pub multipliers: Vec<MultiplierPreset>,
    #[serde(deserialize_with = "deserialize_quick_values")]
    pub quick_values: Vec<Amount>,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_currency: CurrencyCode::Try,
            auto_reset: false,
            first_visit: true,
            is_reversed: false,
            multipliers: default_multipliers(),
            quick_values: default_quick_values(),
            theme: Theme::System,
        }
    }
}

impl Settings {
    /// Change the target currency. USD is the pivot and cannot be a target.
    pub fn set_target_currency(&mut self, code: CurrencyCode) -> Result<()> {
        if code.is_pivot() {
            return Err(TrcalcError::InvalidTarget(code));
        }
        self.target_currency = code;
        Ok(())
    }

    /// Flip auto-reset and return the new value.
    pub fn toggle_auto_reset(&mut self) -> bool {
        self.auto_reset = !self.auto_reset;
        self.auto_reset
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Clear the first-visit flag once onboarding has been shown.
    pub fn mark_visited(&mut self) {
        self.first_visit = false;
    }

    /// Add a quick value, keeping the list ascending.
    pub fn add_quick_value(&mut self, value: Amount) -> Result<()> {
        if value.is_zero() {
            return Err(TrcalcError::invalid_setting(
                "quickValues",
                "quick value must be positive",
            ));
        }
        if self.quick_values.contains(&value) {
            return Err(TrcalcError::invalid_setting(
                "quickValues",
                format!("{value} is already a quick value"),
            ));
        }
        self.quick_values.push(value);
        normalize_quick_values(&mut self.quick_values);
        Ok(())
    }

    /// Remove a quick value. Returns whether it was present.
    pub fn remove_quick_value(&mut self, value: Amount) -> bool {
        let before = self.quick_values.len();
        self.quick_values.retain(|v| *v != value);
        before != self.quick_values.len()
    }

    /// Add a multiplier preset with a generated id.
    pub fn add_multiplier(&mut self, label: &str, percent: i32) -> Result<PresetId> {
        let label = normalize_label(label)?;
        let id = PresetId::generate();
        debug!(%id, %label, percent, "Adding multiplier preset");
        self.multipliers
            .push(MultiplierPreset::new(id.clone(), label, percent));
        Ok(id)
    }

    pub fn update_multiplier_label(&mut self, id: &PresetId, label: &str) -> Result<()> {
        let label = normalize_label(label)?;
        self.multiplier_mut(id)?.label = label;
        Ok(())
    }

    pub fn update_multiplier_percent(&mut self, id: &PresetId, percent: i32) -> Result<()> {
        self.multiplier_mut(id)?.percent = percent;
        Ok(())
    }

    /// Remove a multiplier preset. Returns whether it was present.
    pub fn remove_multiplier(&mut self, id: &PresetId) -> bool {
        let before = self.multipliers.len();
        self.multipliers.retain(|m| &m.id != id);
        before != self.multipliers.len()
    }

    /// Find a multiplier preset by id.
    pub fn multiplier(&self, id: &PresetId) -> Option<&MultiplierPreset> {
        self.multipliers.iter().find(|m| &m.id == id)
    }

    fn multiplier_mut(&mut self, id: &PresetId) -> Result<&mut MultiplierPreset> {
        self.multipliers
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| {
                TrcalcError::invalid_setting("multipliers", format!("no preset with id {id}"))
            })
    }
}

fn normalize_label(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(TrcalcError::invalid_setting(
            "multipliers",
            "label cannot be empty",
        ));
    }
    Ok(label.to_string())
}

impl Versioned for Settings {
    const KEY: &'static str = keys::SETTINGS;
    const VERSION: u32 = 1;
}
