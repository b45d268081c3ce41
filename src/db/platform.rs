use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// The backend variant a run executes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    None,
    /// MPP SQL engine reached over the network.
    Network,
    /// In-process distributed SQL context.
    Embedded,
}

impl Platform {
    pub fn label(&self) -> &'static str {
        match self {
            Platform::None => "none",
            Platform::Network => "network",
            Platform::Embedded => "embedded",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Write-once record of the active platform for one run.
///
/// Set exactly once, after a connection has been established, and read by
/// everything that shapes queries per backend. Setting it a second time is a
/// programming error and is reported instead of overwriting the value.
#[derive(Debug, Default)]
pub struct PlatformSelector {
    cell: OnceLock<Platform>,
}

impl PlatformSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, platform: Platform) -> Result<()> {
        if platform == Platform::None {
            return Err(Error::Configuration(
                "cannot select the `none` execution platform".to_string(),
            ));
        }
        self.cell
            .set(platform)
            .map_err(|_| Error::PlatformAlreadySet(self.cell.get().copied().unwrap_or_default()))
    }

    pub fn get(&self) -> Result<Platform> {
        self.cell.get().copied().ok_or(Error::PlatformNotSet)
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_before_set_fails() {
        let selector = PlatformSelector::new();
        assert!(!selector.is_set());
        assert!(matches!(selector.get(), Err(Error::PlatformNotSet)));
    }

    #[test]
    fn test_set_once() {
        let selector = PlatformSelector::new();
        selector.set(Platform::Embedded).unwrap();
        assert_eq!(selector.get().unwrap(), Platform::Embedded);
    }

    #[test]
    fn test_second_set_fails_and_keeps_first_value() {
        let selector = PlatformSelector::new();
        selector.set(Platform::Network).unwrap();
        let err = selector.set(Platform::Embedded).unwrap_err();
        assert!(matches!(err, Error::PlatformAlreadySet(Platform::Network)));
        assert_eq!(selector.get().unwrap(), Platform::Network);
    }

    #[test]
    fn test_none_is_not_selectable() {
        let selector = PlatformSelector::new();
        assert!(selector.set(Platform::None).is_err());
        assert!(!selector.is_set());
    }
}
