use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Which pixel engine performs the transforms
    pub engine: EngineKind,
    /// Dimension caps applied before any buffer is pinned
    pub limits: Limits,
    /// Default tracing filter for the command-line tool
    pub log_filter: Option<String>,
}

/// Pixel engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Portable Rust kernels
    Software,
    /// libyuv (requires the `libyuv` feature)
    Libyuv,
}

impl Default for EngineKind {
    fn default() -> Self {
        if cfg!(feature = "libyuv") {
            EngineKind::Libyuv
        } else {
            EngineKind::Software
        }
    }
}

impl EngineKind {
    /// Whether this build can run the engine
    pub fn is_available(&self) -> bool {
        match self {
            EngineKind::Software => true,
            EngineKind::Libyuv => cfg!(feature = "libyuv"),
        }
    }
}

/// Caps on frame dimensions; `None` means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Maximum width x height
    pub max_pixels: Option<u64>,
}

impl Limits {
    /// No limits
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn with_max_pixels(mut self, pixels: u64) -> Self {
        self.max_pixels = Some(pixels);
        self
    }

    pub fn has_any(&self) -> bool {
        self.max_width.is_some() || self.max_height.is_some() || self.max_pixels.is_some()
    }

    /// Reject a `width`x`height` frame that exceeds any cap.
    ///
    /// Non-positive dimensions are left to layout validation.
    pub fn check(&self, width: i32, height: i32) -> Result<()> {
        if width <= 0 || height <= 0 {
            return Ok(());
        }
        let (w, h) = (width as u32, height as u32);
        if let Some(max) = self.max_width {
            if w > max {
                return Err(BridgeError::LimitExceeded(format!(
                    "width {} exceeds {}",
                    w, max
                )));
            }
        }
        if let Some(max) = self.max_height {
            if h > max {
                return Err(BridgeError::LimitExceeded(format!(
                    "height {} exceeds {}",
                    h, max
                )));
            }
        }
        if let Some(max) = self.max_pixels {
            let pixels = w as u64 * h as u64;
            if pixels > max {
                return Err(BridgeError::LimitExceeded(format!(
                    "{} pixels exceeds {}",
                    pixels, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.engine.is_available());
        assert!(!config.limits.has_any());
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_limits_check() {
        let limits = Limits::none().with_max_width(1920).with_max_pixels(1920 * 1080);
        assert!(limits.check(1920, 1080).is_ok());
        assert_eq!(limits.check(3840, 2).unwrap_err().status(), -6);
        assert_eq!(limits.check(1920, 1082).unwrap_err().status(), -6);
        assert!(Limits::none().with_max_height(2).check(4, 2).is_ok());
        assert!(Limits::none().with_max_height(2).check(4, 4).is_err());
        // Left to layout validation
        assert!(limits.check(0, 0).is_ok());
    }

    #[test]
    fn test_software_always_available() {
        assert!(EngineKind::Software.is_available());
        assert_eq!(EngineKind::Libyuv.is_available(), cfg!(feature = "libyuv"));
    }
}
