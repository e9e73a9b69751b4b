use std::time::Duration;

/// The outcome of one `run_command` invocation.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub package_name: String,
    pub command: String,
    pub success: bool,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn spawn_failure(package_name: impl Into<String>, command: impl Into<String>, duration: Duration) -> Self {
        Self {
            package_name: package_name.into(),
            command: command.into(),
            success: false,
            exit_code: 1,
            duration,
        }
    }
}
