//! Reading the tenancy & region from an OCI CLI configuration file
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The profile whose settings apply to every other profile that doesn't
/// override them
pub(crate) static DEFAULT_PROFILE: &str = "DEFAULT";

/// Returns the location of the OCI CLI configuration file in the user's home
/// directory, if `$HOME` is set
pub(crate) fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".oci").join("config"))
}

/// The settings of a single profile of an OCI CLI configuration file that
/// are needed to locate the cost reports
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct OciProfile {
    pub(crate) tenancy: Option<String>,
    pub(crate) region: Option<String>,
}

impl OciProfile {
    /// Read the settings for `profile` from the configuration file at `path`
    pub(crate) fn load(path: &Path, profile: &str) -> Result<OciProfile, OciConfigError> {
        tracing::debug!(path = %path.display(), profile, "Reading OCI configuration");
        let content = fs_err::read_to_string(path).map_err(|source| OciConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        OciProfile::parse(&content, profile).map_err(|source| OciConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Parse the settings for `profile` from the text of a configuration
    /// file.  Keys that `profile` does not set are taken from the
    /// [`DEFAULT_PROFILE`] section.
    pub(crate) fn parse(content: &str, profile: &str) -> Result<OciProfile, ParseConfigError> {
        let mut sections = HashMap::<&str, HashMap<&str, &str>>::new();
        let mut current = None;
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let name = name.trim();
                sections.entry(name).or_default();
                current = Some(name);
            } else if let (Some(section), Some((key, value))) = (current, line.split_once('=')) {
                sections
                    .entry(section)
                    .or_default()
                    .insert(key.trim(), value.trim());
            } else {
                return Err(ParseConfigError::Syntax { line: i + 1 });
            }
        }
        let Some(own) = sections.get(profile) else {
            return Err(ParseConfigError::UnknownProfile {
                profile: profile.to_owned(),
            });
        };
        let defaults = sections.get(DEFAULT_PROFILE);
        let lookup = |key: &str| {
            own.get(key)
                .or_else(|| defaults.and_then(|d| d.get(key)))
                .filter(|v| !v.is_empty())
                .map(|v| (*v).to_owned())
        };
        Ok(OciProfile {
            tenancy: lookup("tenancy"),
            region: lookup("region"),
        })
    }
}

#[derive(Debug, Error)]
pub(crate) enum OciConfigError {
    #[error("failed to read OCI config file {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse OCI config file {}", path.display())]
    Parse {
        path: PathBuf,
        source: ParseConfigError,
    },
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub(crate) enum ParseConfigError {
    #[error("line {line} is neither a [PROFILE] header nor a key=value setting within a profile")]
    Syntax { line: usize },
    #[error("profile {profile:?} not found")]
    UnknownProfile { profile: String },
}
