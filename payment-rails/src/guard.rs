//! Initialization guard shared by the providers

use crate::{Error, Result};
use std::sync::OnceLock;

/// Holds a provider's runtime state once `initialize` has run.
///
/// Set exactly once; reads before that fail with [`Error::NotInitialized`].
#[derive(Debug)]
pub struct InitGuard<T> {
    provider: &'static str,
    state: OnceLock<T>,
}

impl<T> InitGuard<T> {
    /// Empty guard for `provider`
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            state: OnceLock::new(),
        }
    }

    /// Store the state. A second call fails and leaves the first state in place.
    pub fn init(&self, state: T) -> Result<()> {
        self.state
            .set(state)
            .map_err(|_| Error::AlreadyInitialized {
                provider: self.provider.to_string(),
            })
    }

    /// State, or `NotInitialized`
    pub fn get(&self) -> Result<&T> {
        self.state.get().ok_or_else(|| Error::NotInitialized {
            provider: self.provider.to_string(),
        })
    }

    /// True once `init` succeeded
    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_before_init_fails() {
        let guard: InitGuard<u32> = InitGuard::new("NIBSS");
        assert!(!guard.is_initialized());
        assert!(matches!(guard.get(), Err(Error::NotInitialized { .. })));
    }

    #[test]
    fn test_init_once() {
        let guard = InitGuard::new("ACH");
        guard.init(7u32).unwrap();
        assert_eq!(*guard.get().unwrap(), 7);

        assert!(matches!(guard.init(8), Err(Error::AlreadyInitialized { .. })));
        assert_eq!(*guard.get().unwrap(), 7);
    }
}
