use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Launch specification for one backend, taken from an `mcpServers` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl ServerConfig {
    /// Human readable command line, used for progress output.
    pub fn command_line(&self) -> String {
        let mut line = self.command.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: Option<HashMap<String, String>>,
    #[serde(default)]
    cwd: Option<String>,
}

impl RawServer {
    pub(crate) fn into_config(self, name: impl Into<String>) -> ServerConfig {
        let expand = |s: &str| -> String {
            shellexpand::full(s)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| s.to_string())
        };

        ServerConfig {
            name: name.into(),
            command: PathBuf::from(expand(&self.command)),
            args: self.args.iter().map(|arg| expand(arg)).collect(),
            env: self.env.unwrap_or_default(),
            cwd: self.cwd.map(|dir| PathBuf::from(expand(&dir))),
        }
    }
}
