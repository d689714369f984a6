use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

use crate::models::Platform;

/// RGB color for the presence indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndicatorColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl IndicatorColor {
    /// Used when no platform-specific color applies, e.g. manual activation
    pub const DEFAULT: IndicatorColor = IndicatorColor::rgb(0, 255, 255);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Teams => Self::rgb(0, 0, 255),
            Platform::WebEx => Self::rgb(0, 255, 0),
            Platform::Zoom => Self::rgb(255, 0, 0),
            Platform::None => Self::DEFAULT,
        }
    }
}

impl fmt::Display for IndicatorColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

/// Physical "on air" sign or any other on/off presence indicator
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn turn_on(&self, color: IndicatorColor) -> Result<()>;
    async fn turn_off(&self) -> Result<()>;
}

/// Indicator that only reports its state through the log
#[derive(Debug, Default)]
pub struct LogActuator {
    state: Mutex<Option<IndicatorColor>>,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color currently shown, `None` when off
    pub fn current(&self) -> Option<IndicatorColor> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Actuator for LogActuator {
    async fn turn_on(&self, color: IndicatorColor) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(color);
        info!("Indicator ON {color}");
        Ok(())
    }

    async fn turn_off(&self) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = None;
        info!("Indicator OFF");
        Ok(())
    }
}
