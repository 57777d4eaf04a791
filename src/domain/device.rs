// ============================================================
// Layer 3 — Device Selector
// ============================================================
// The integer device convention used on the command line and in
// checkpoints: any negative value means CPU only, n >= 0 selects
// accelerator n. The value is carried explicitly through the
// config instead of being set as process-wide state.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceSelector(i32);

impl DeviceSelector {
    pub const CPU: Self = Self(-1);

    pub fn new(index: i32) -> Self {
        Self(index)
    }

    /// Accelerator ordinal, or `None` for CPU.
    pub fn accelerator(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::CPU
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.accelerator() {
            Some(n) => write!(f, "accelerator {n}"),
            None    => write!(f, "cpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_means_cpu() {
        assert_eq!(DeviceSelector::new(-1).accelerator(), None);
        assert_eq!(DeviceSelector::new(-7).to_string(), "cpu");
        assert_eq!(DeviceSelector::default(), DeviceSelector::CPU);
    }

    #[test]
    fn test_accelerator_index() {
        let sel = DeviceSelector::new(2);
        assert_eq!(sel.accelerator(), Some(2));
        assert_eq!(sel.to_string(), "accelerator 2");
    }

    #[test]
    fn test_serialises_as_plain_integer() {
        let json = serde_json::to_string(&DeviceSelector::new(0)).unwrap();
        assert_eq!(json, "0");
        let back: DeviceSelector = serde_json::from_str("-1").unwrap();
        assert_eq!(back, DeviceSelector::CPU);
    }
}
