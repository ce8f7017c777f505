// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Job configuration for `sgy-stack`.
//!
//! The file is a list of `key=value` lines. Blank lines and lines starting
//! with `#` are ignored, as are lines without `=`. Recognized keys:
//!
//! | key                          | required | meaning                              |
//! |------------------------------|----------|--------------------------------------|
//! | `input_file`                 | yes      | SEG-Y file to stack                  |
//! | `output_file`                | yes      | stacked SEG-Y file to create         |
//! | `velocity_file`              | yes      | velocity table, or `.sgy`/`.segy`    |
//! | `nmo_stretch_muting_percent` | yes      | stretch mute threshold               |
//! | `num_threads`                | no       | worker threads, 0 = all cores        |
//! | `index_file`                 | no       | trace index artifact, default `<input_file>.idx` |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

const KNOWN_KEYS: &[&str] = &[
    "input_file",
    "output_file",
    "velocity_file",
    "nmo_stretch_muting_percent",
    "num_threads",
    "index_file",
];

/// Error type for loading a job configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A required key is absent or empty.
    #[error("missing required key `{0}`")]
    Missing(&'static str),
    /// A value does not parse as the key's type.
    #[error("invalid value `{value}` for `{key}`")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Everything one `sgy-stack` run needs.
#[derive(Clone, Debug, PartialEq)]
pub struct JobConfig {
    /// SEG-Y file to stack.
    pub input_file: PathBuf,
    /// Stacked output file.
    pub output_file: PathBuf,
    /// Velocity table, or a velocity SEG-Y file.
    pub velocity_file: PathBuf,
    /// NMO stretch mute threshold, percent.
    pub nmo_stretch_muting_percent: f32,
    /// Worker threads; 0 uses every core.
    pub num_threads: usize,
    /// Durable trace index artifact.
    pub index_file: PathBuf,
}

impl JobConfig {
    /// Reads and parses the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses config text. Later lines override earlier ones.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut params = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if !KNOWN_KEYS.contains(&key) {
                warn!(key, "ignoring unknown config key");
            }
            params.insert(key.to_owned(), value.trim().to_owned());
        }

        let required = |key: &'static str| {
            params
                .get(key)
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let input_file = PathBuf::from(required("input_file")?);
        let output_file = PathBuf::from(required("output_file")?);
        let velocity_file = PathBuf::from(required("velocity_file")?);
        let mute = required("nmo_stretch_muting_percent")?;
        let nmo_stretch_muting_percent = mute
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ConfigError::Invalid {
                key: "nmo_stretch_muting_percent",
                value: mute.to_owned(),
            })?;
        let num_threads = match params.get("num_threads").filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<usize>().map_err(|_| ConfigError::Invalid {
                key: "num_threads",
                value: raw.clone(),
            })?,
            None => 0,
        };
        let index_file = params
            .get("index_file")
            .filter(|v| !v.is_empty())
            .map_or_else(|| default_index_file(&input_file), PathBuf::from);

        Ok(Self {
            input_file,
            output_file,
            velocity_file,
            nmo_stretch_muting_percent,
            num_threads,
            index_file,
        })
    }
}

fn default_index_file(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".idx");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "\
# stacking job
input_file=data/line.sgy
output_file = out/stack.sgy
velocity_file=vel.txt

nmo_stretch_muting_percent=30
";

    #[test]
    fn parses_required_keys_and_defaults() {
        let cfg = JobConfig::parse(MINIMAL).unwrap();
        assert_eq!(cfg.input_file, PathBuf::from("data/line.sgy"));
        assert_eq!(cfg.output_file, PathBuf::from("out/stack.sgy"));
        assert_eq!(cfg.velocity_file, PathBuf::from("vel.txt"));
        assert_eq!(cfg.nmo_stretch_muting_percent, 30.0);
        assert_eq!(cfg.num_threads, 0);
        assert_eq!(cfg.index_file, PathBuf::from("data/line.sgy.idx"));
    }

    #[test]
    fn optional_keys_override_defaults() {
        let text = format!("{MINIMAL}num_threads=4\nindex_file=/tmp/x.idx\n");
        let cfg = JobConfig::parse(&text).unwrap();
        assert_eq!(cfg.num_threads, 4);
        assert_eq!(cfg.index_file, PathBuf::from("/tmp/x.idx"));
    }

    #[test]
    fn missing_and_invalid_values() {
        assert!(matches!(
            JobConfig::parse("input_file=a\noutput_file=b\nvelocity_file=c\n"),
            Err(ConfigError::Missing("nmo_stretch_muting_percent"))
        ));
        assert!(matches!(
            JobConfig::parse("input_file=\noutput_file=b\n"),
            Err(ConfigError::Missing("input_file"))
        ));
        let bad_mute = MINIMAL.replace("=30", "=lots");
        assert!(matches!(
            JobConfig::parse(&bad_mute),
            Err(ConfigError::Invalid { key: "nmo_stretch_muting_percent", .. })
        ));
        let bad_threads = format!("{MINIMAL}num_threads=-2\n");
        assert!(matches!(
            JobConfig::parse(&bad_threads),
            Err(ConfigError::Invalid { key: "num_threads", .. })
        ));
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.cfg");
        match JobConfig::load(&path) {
            Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
