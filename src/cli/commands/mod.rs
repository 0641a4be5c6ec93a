//! CLI command implementations

pub mod completions;
pub mod config;
pub mod download;
pub mod paths;

pub use completions::execute as completions;
pub use config::execute as config;
pub use download::execute as download;
pub use paths::execute as paths;

use crate::cache::{resolved_cache_paths, CachePaths, IdentityKey};
use crate::cli::args::{IdentityArgs, LocationArgs};
use crate::config::Config;
use crate::error::KeepsakeResult;

/// Build the identity from flags and environment, falling back to config
pub(crate) fn resolve_identity(args: &IdentityArgs, config: &Config) -> KeepsakeResult<IdentityKey> {
    let token = args
        .token
        .clone()
        .or_else(|| config.api.token.clone())
        .unwrap_or_default();
    let project = args.project.clone().or_else(|| config.api.project.clone());
    let config_name = args.config.clone().or_else(|| config.api.config.clone());

    IdentityKey::new(token, project, config_name)
}

/// Resolve fallback file paths, honoring `--fallback` and `--fallback-dir`
pub(crate) fn resolve_paths(
    identity: &IdentityKey,
    location: &LocationArgs,
    config: &Config,
) -> KeepsakeResult<CachePaths> {
    let dir = location
        .fallback_dir
        .as_deref()
        .or(config.fallback.dir.as_deref());

    Ok(resolved_cache_paths(identity, dir)?.with_entry_override(location.fallback.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeepsakeError;
    use std::path::PathBuf;

    #[test]
    fn identity_flags_override_config() {
        let mut config = Config::default();
        config.api.token = Some("config-token".into());
        config.api.project = Some("backend".into());
        config.api.config = Some("prd".into());

        let args = IdentityArgs {
            token: None,
            project: None,
            config: Some("dev".into()),
        };
        let identity = resolve_identity(&args, &config).unwrap();

        assert_eq!(identity.credential(), "config-token");
        assert_eq!(identity.project(), "backend");
        assert_eq!(identity.config(), "dev");
    }

    #[test]
    fn identity_requires_token() {
        let err = resolve_identity(&IdentityArgs::default(), &Config::default()).unwrap_err();
        assert!(matches!(err, KeepsakeError::MissingIdentity("token")));
    }

    #[test]
    fn location_flag_beats_config_dir() {
        let mut config = Config::default();
        config.fallback.dir = Some(PathBuf::from("/from/config"));
        let identity = IdentityKey::new("tok", None, None).unwrap();

        let location = LocationArgs {
            fallback: None,
            fallback_dir: Some(PathBuf::from("/from/flag")),
        };
        let paths = resolve_paths(&identity, &location, &config).unwrap();
        assert!(paths.entry.starts_with("/from/flag"));
        assert!(paths.metadata.starts_with("/from/flag"));

        let paths = resolve_paths(&identity, &LocationArgs::default(), &config).unwrap();
        assert!(paths.entry.starts_with("/from/config"));
    }

    #[test]
    fn fallback_flag_replaces_entry_only() {
        let identity = IdentityKey::new("tok", None, None).unwrap();
        let location = LocationArgs {
            fallback: Some(PathBuf::from("/tmp/custom.enc")),
            fallback_dir: Some(PathBuf::from("/cache")),
        };

        let paths = resolve_paths(&identity, &location, &Config::default()).unwrap();
        assert_eq!(paths.entry, PathBuf::from("/tmp/custom.enc"));
        assert!(paths.metadata.starts_with("/cache"));
        assert!(paths.legacy.is_none());
    }
}
