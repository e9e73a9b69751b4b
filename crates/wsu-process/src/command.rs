use std::path::PathBuf;

use owo_colors::AnsiColors;

/// Everything needed to spawn and identify one child process.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub package_name: String,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub log_prefix: String,
    pub log_color: AnsiColors,
    /// Whether log lines from this command are timestamped. Off for `dev`,
    /// off by default elsewhere.
    pub timestamps: bool,
}

impl CommandSpec {
    pub fn new(package_name: impl Into<String>, command: impl Into<String>, args: Vec<String>, cwd: PathBuf) -> Self {
        let package_name = package_name.into();
        let log_prefix = package_name.clone();
        Self {
            package_name,
            command: command.into(),
            args,
            cwd,
            env: Vec::new(),
            log_prefix,
            log_color: AnsiColors::White,
            timestamps: false,
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_color(mut self, color: AnsiColors) -> Self {
        self.log_color = color;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}
