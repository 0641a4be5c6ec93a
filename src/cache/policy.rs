//! Fetch policy normalization
//!
//! The CLI exposes five independent switches. They are folded into one
//! immutable [`FetchPolicy`] here, with the composition rules applied once
//! so the orchestrator never re-checks flag combinations.

use crate::error::{KeepsakeError, KeepsakeResult};

/// Which path through the fetch state machine a policy selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Remote only, no fallback file involved
    RemoteOnly,
    /// Fallback file only, the remote is never contacted
    CacheOnly,
    /// Remote first, fallback file on failure
    RemoteWithFallback,
}

/// Normalized fetch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    cache: bool,
    fallback: bool,
    readonly: bool,
    only: bool,
    exit_on_write_failure: bool,
}

impl FetchPolicy {
    pub fn builder() -> FetchPolicyBuilder {
        FetchPolicyBuilder::default()
    }

    /// Use stored freshness metadata for conditional fetches
    pub fn cache_enabled(&self) -> bool {
        self.cache
    }

    /// Never write the fallback file
    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// Never contact the remote
    pub fn fallback_only(&self) -> bool {
        self.only
    }

    /// Treat a failed fallback write as fatal
    pub fn exit_on_write_failure(&self) -> bool {
        self.exit_on_write_failure
    }

    pub fn mode(&self) -> FetchMode {
        if !self.fallback {
            FetchMode::RemoteOnly
        } else if self.only {
            FetchMode::CacheOnly
        } else {
            FetchMode::RemoteWithFallback
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            cache: true,
            fallback: true,
            readonly: false,
            only: false,
            exit_on_write_failure: true,
        }
    }
}

/// Builder for [`FetchPolicy`]; starts from the defaults
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicyBuilder {
    inner: FetchPolicy,
}

impl Default for FetchPolicyBuilder {
    fn default() -> Self {
        Self {
            inner: FetchPolicy::default(),
        }
    }
}

impl FetchPolicyBuilder {
    pub fn cache(mut self, enabled: bool) -> Self {
        self.inner.cache = enabled;
        self
    }

    pub fn fallback(mut self, enabled: bool) -> Self {
        self.inner.fallback = enabled;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.inner.readonly = readonly;
        self
    }

    pub fn fallback_only(mut self, only: bool) -> Self {
        self.inner.only = only;
        self
    }

    pub fn exit_on_write_failure(mut self, exit: bool) -> Self {
        self.inner.exit_on_write_failure = exit;
        self
    }

    /// Apply the composition rules and freeze the policy
    pub fn build(self) -> KeepsakeResult<FetchPolicy> {
        let mut policy = self.inner;

        if policy.only && !policy.fallback {
            return Err(KeepsakeError::PolicyConflict(
                "--fallback-only cannot be combined with --no-fallback",
            ));
        }
        if policy.only {
            policy.readonly = true;
        }
        if !policy.fallback {
            policy.cache = false;
        }

        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let policy = FetchPolicy::builder().build().unwrap();
        assert_eq!(policy, FetchPolicy::default());
        assert_eq!(policy.mode(), FetchMode::RemoteWithFallback);
        assert!(policy.cache_enabled());
        assert!(policy.exit_on_write_failure());
    }

    #[test]
    fn fallback_only_implies_readonly() {
        let policy = FetchPolicy::builder()
            .fallback_only(true)
            .readonly(false)
            .build()
            .unwrap();
        assert!(policy.readonly());
        assert_eq!(policy.mode(), FetchMode::CacheOnly);
    }

    #[test]
    fn no_fallback_forces_cache_off() {
        let policy = FetchPolicy::builder()
            .fallback(false)
            .cache(true)
            .build()
            .unwrap();
        assert!(!policy.cache_enabled());
        assert_eq!(policy.mode(), FetchMode::RemoteOnly);
    }

    #[test]
    fn fallback_only_without_fallback_conflicts() {
        let err = FetchPolicy::builder()
            .fallback(false)
            .fallback_only(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, KeepsakeError::PolicyConflict(_)));
    }
}
