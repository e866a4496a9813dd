use crate::error::{Axis, MapError, Result};

/// Maximum source image dimensions. A limit of 0 means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl SizeLimits {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_width == 0 && self.max_height == 0
    }

    /// Check source dimensions. Width is checked before height.
    pub fn check(&self, width: u32, height: u32, bypass: bool) -> Result<()> {
        if bypass || self.is_unlimited() {
            return Ok(());
        }
        if self.max_width > 0 && width > self.max_width {
            return Err(MapError::SizeLimit {
                axis: Axis::Width,
                limit: self.max_width,
                actual: width,
            });
        }
        if self.max_height > 0 && height > self.max_height {
            return Err(MapError::SizeLimit {
                axis: Axis::Height,
                limit: self.max_height,
                actual: height,
            });
        }
        Ok(())
    }
}
