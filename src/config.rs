//! Process configuration: CLI flags plus the `--options_file` JSON bag,
//! shallow-merged with `/initialize`'s `user_options` at runtime.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use serde_json::{Map, Value};

/// CLI flags, matching the set an editor client launches this server with.
#[derive(Parser, Debug)]
#[command(name = "complete-server", version, about, long_about = None)]
pub struct Cli {
    /// TCP port to listen on.
    #[arg(long)]
    pub port: u16,

    /// Path to redirect stdout to (the owning editor typically discards
    /// this process's normal stdio once it has the port).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Path to redirect stderr to.
    #[arg(long)]
    pub err: Option<PathBuf>,

    /// Required path to a JSON object of initial options.
    #[arg(long)]
    pub options_file: PathBuf,

    /// Sleep at startup so a debugger can attach before serving requests.
    #[arg(long)]
    pub wait_for_debugger: bool,
}

const DEFAULT_MIN_NUM_OF_CHARS_FOR_COMPLETION: u32 = 0;
const DEFAULT_MIN_NUM_IDENTIFIER_CANDIDATE_CHARS: u32 = 0;

/// Process-wide configuration: the handful of keys the core reads by name,
/// plus an "everything else" passthrough bag for keys callers set that this
/// server doesn't interpret itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub min_num_of_chars_for_completion: u32,
    pub min_num_identifier_candidate_chars: u32,
    pub clangd_binary_path: Option<String>,
    /// Every recognised key above, plus any unrecognised ones, verbatim —
    /// echoed back from `/debug_info`'s `extra_conf` field.
    pub raw: Map<String, Value>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            min_num_of_chars_for_completion: DEFAULT_MIN_NUM_OF_CHARS_FOR_COMPLETION,
            min_num_identifier_candidate_chars: DEFAULT_MIN_NUM_IDENTIFIER_CANDIDATE_CHARS,
            clangd_binary_path: None,
            raw: Map::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecognisedOptions {
    #[serde(default)]
    min_num_of_chars_for_completion: Option<u32>,
    #[serde(default)]
    min_num_identifier_candidate_chars: Option<u32>,
    #[serde(default)]
    clangd_binary_path: Option<String>,
}

impl ServerConfig {
    /// Reads `--options_file`: a required JSON object. An I/O error or a
    /// parse error here is fatal — the process exits before serving a
    /// single request, matching the distilled-from implementation's
    /// "can't start without options" behaviour.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("could not read options file {}: {e}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| format!("options file {} is not valid JSON: {e}", path.display()))?;
        let Value::Object(raw) = value else {
            return Err(format!("options file {} must contain a JSON object", path.display()));
        };

        let mut config = Self { raw, ..Self::default() };
        config.apply_recognised();
        Ok(config)
    }

    /// Shallow-merges `user_options` on top of the current config:
    /// present keys overwrite, absent keys are left untouched.
    pub fn merge_user_options(&mut self, user_options: &Map<String, Value>) {
        for (k, v) in user_options {
            self.raw.insert(k.clone(), v.clone());
        }
        self.apply_recognised();
    }

    fn apply_recognised(&mut self) {
        let recognised: RecognisedOptions =
            serde_json::from_value(Value::Object(self.raw.clone())).unwrap_or(RecognisedOptions {
                min_num_of_chars_for_completion: None,
                min_num_identifier_candidate_chars: None,
                clangd_binary_path: None,
            });
        if let Some(v) = recognised.min_num_of_chars_for_completion {
            self.min_num_of_chars_for_completion = v;
        }
        if let Some(v) = recognised.min_num_identifier_candidate_chars {
            self.min_num_identifier_candidate_chars = v;
        }
        if recognised.clangd_binary_path.is_some() {
            self.clangd_binary_path = recognised.clangd_binary_path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_options(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_recognised_keys_from_file() {
        let f = write_options(r#"{"min_num_of_chars_for_completion": 3}"#);
        let config = ServerConfig::load(f.path()).unwrap();
        assert_eq!(config.min_num_of_chars_for_completion, 3);
    }

    #[test]
    fn unrecognised_keys_are_retained_but_inert() {
        let f = write_options(r#"{"some_future_option": "x"}"#);
        let config = ServerConfig::load(f.path()).unwrap();
        assert_eq!(config.raw.get("some_future_option").unwrap(), "x");
        assert_eq!(config.min_num_of_chars_for_completion, 0);
    }

    #[test]
    fn user_options_override_file_values() {
        let f = write_options(r#"{"min_num_of_chars_for_completion": 3}"#);
        let mut config = ServerConfig::load(f.path()).unwrap();
        let mut overrides = Map::new();
        overrides.insert("min_num_of_chars_for_completion".to_string(), Value::from(1));
        config.merge_user_options(&overrides);
        assert_eq!(config.min_num_of_chars_for_completion, 1);
    }

    #[test]
    fn unset_key_in_user_options_leaves_file_value_intact() {
        let f = write_options(
            r#"{"min_num_of_chars_for_completion": 3, "min_num_identifier_candidate_chars": 2}"#,
        );
        let mut config = ServerConfig::load(f.path()).unwrap();
        let mut overrides = Map::new();
        overrides.insert("min_num_of_chars_for_completion".to_string(), Value::from(1));
        config.merge_user_options(&overrides);
        assert_eq!(config.min_num_of_chars_for_completion, 1);
        assert_eq!(config.min_num_identifier_candidate_chars, 2);
    }

    #[test]
    fn non_object_options_file_is_rejected() {
        let f = write_options("[1, 2, 3]");
        assert!(ServerConfig::load(f.path()).is_err());
    }
}
