//! TRCalc Calculator
//!
//! The calculator session: keypad input and conversion, the focus-driven
//! reset state machine, persisted settings and the display views published
//! to the presentation layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use trcalc_calculator::{Calculator, CalculatorConfig};
//!
//! let calc = Calculator::open(&CalculatorConfig::from_env())?;
//! calc.start();
//! calc.press_digit(1);
//! calc.press_digit(0);
//! calc.press_digit(0);
//! println!("{}", calc.view().output);
//! ```

pub mod config;
pub mod display;
pub mod engine;
pub mod focus;
pub mod session;
pub mod settings;

pub use config::{CalculatorConfig, RateSource};
pub use display::{AutoResetIndicator, DisplayView};
pub use engine::{Conversion, ConversionEngine};
pub use focus::{FocusResetCoordinator, FocusState};
pub use session::Calculator;
pub use settings::{MultiplierPreset, Settings, Theme};
