//! Per-machine runtime context
//!
//! Everything a running machine would otherwise keep in globals lives here:
//! the diagnostic log configuration, the monochrome palette and the
//! stuck-CPU policy. One context is built at startup and shared with the bus
//! and the system through an `Arc`.

use std::sync::atomic::{AtomicU8, Ordering};

use emu_core::logging::{LogConfig, LogLevel};
use serde::{Deserialize, Serialize};

use crate::palette::DmgPalette;
use crate::GbError;

/// User-facing configuration, usually read from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbConfig {
    /// Monochrome palette name
    pub palette: String,
    /// Fail `step_frame` when the CPU stops making progress
    pub panic_on_stuck: bool,
    pub log_level: String,
    /// Run colour-flagged cartridges in monochrome mode
    pub force_dmg: bool,
}

impl Default for GbConfig {
    fn default() -> Self {
        Self {
            palette: DmgPalette::default().name().to_string(),
            panic_on_stuck: false,
            log_level: "warn".to_string(),
            force_dmg: false,
        }
    }
}

/// Shared runtime state of one machine
#[derive(Debug)]
pub struct EmuContext {
    log: LogConfig,
    palette: AtomicU8,
    panic_on_stuck: bool,
    force_dmg: bool,
}

impl Default for EmuContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EmuContext {
    /// Context with warnings enabled and the default palette
    pub fn new() -> Self {
        Self {
            log: LogConfig::with_level(LogLevel::Warn),
            palette: AtomicU8::new(DmgPalette::default().index()),
            panic_on_stuck: false,
            force_dmg: false,
        }
    }

    pub fn from_config(config: &GbConfig) -> Result<Self, GbError> {
        let palette =
            DmgPalette::from_name(&config.palette).ok_or_else(|| GbError::InvalidConfig {
                field: "palette",
                value: config.palette.clone(),
            })?;
        let level =
            LogLevel::from_str(&config.log_level).ok_or_else(|| GbError::InvalidConfig {
                field: "log_level",
                value: config.log_level.clone(),
            })?;

        Ok(Self {
            log: LogConfig::with_level(level),
            palette: AtomicU8::new(palette.index()),
            panic_on_stuck: config.panic_on_stuck,
            force_dmg: config.force_dmg,
        })
    }

    pub fn logger(&self) -> &LogConfig {
        &self.log
    }

    pub fn palette(&self) -> DmgPalette {
        DmgPalette::from_index(self.palette.load(Ordering::Relaxed))
    }

    pub fn set_palette(&self, palette: DmgPalette) {
        self.palette.store(palette.index(), Ordering::Relaxed);
    }

    /// Switch to the next palette and return it
    pub fn cycle_palette(&self) -> DmgPalette {
        let next = self.palette().next();
        self.set_palette(next);
        next
    }

    pub fn panic_on_stuck(&self) -> bool {
        self.panic_on_stuck
    }

    pub fn force_dmg(&self) -> bool {
        self.force_dmg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_context() {
        let ctx = EmuContext::from_config(&GbConfig::default()).unwrap();
        assert_eq!(ctx.palette(), DmgPalette::Bgb);
        assert_eq!(ctx.logger().get_global_level(), LogLevel::Warn);
        assert!(!ctx.panic_on_stuck());
        assert!(!ctx.force_dmg());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: GbConfig =
            serde_json::from_str(r#"{"palette": "crimson", "panic_on_stuck": true}"#).unwrap();
        assert_eq!(config.log_level, "warn");
        let ctx = EmuContext::from_config(&config).unwrap();
        assert_eq!(ctx.palette(), DmgPalette::Crimson);
        assert!(ctx.panic_on_stuck());
    }

    #[test]
    fn test_invalid_config_names_field() {
        let config = GbConfig {
            palette: "sepia".to_string(),
            ..GbConfig::default()
        };
        match EmuContext::from_config(&config) {
            Err(GbError::InvalidConfig { field, value }) => {
                assert_eq!(field, "palette");
                assert_eq!(value, "sepia");
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }

        let config = GbConfig {
            log_level: "loud".to_string(),
            ..GbConfig::default()
        };
        assert!(matches!(
            EmuContext::from_config(&config),
            Err(GbError::InvalidConfig { field: "log_level", .. })
        ));
    }

    #[test]
    fn test_cycle_palette() {
        let ctx = EmuContext::new();
        assert_eq!(ctx.cycle_palette(), DmgPalette::Nyx4);
        assert_eq!(ctx.palette(), DmgPalette::Nyx4);
        ctx.set_palette(DmgPalette::ColdFire);
        assert_eq!(ctx.cycle_palette(), DmgPalette::Greyscale);
    }
}
