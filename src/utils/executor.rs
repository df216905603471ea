//! Command execution abstraction for testability
//!
//! External tools (`smbclient`, `mysqldump`) are invoked through this trait so
//! tests can record the exact invocation without the tools being installed.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

/// Abstraction for command execution, enabling mocking in tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command with captured output
    async fn run_command(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Output>;

    /// Run a command streaming its stdout into a file, returning bytes written
    async fn run_command_to_file(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        output_path: &Path,
        timeout: Option<Duration>,
    ) -> Result<u64>;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for RealExecutor {
    async fn run_command(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Output> {
        super::command::run_command(program, args, envs, timeout).await
    }

    async fn run_command_to_file(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        output_path: &Path,
        timeout: Option<Duration>,
    ) -> Result<u64> {
        super::command::run_command_to_file(program, args, envs, output_path, timeout).await
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        pub envs: Vec<(String, String)>,
        pub output_path: Option<String>,
    }

    impl CommandCall {
        /// Look up an environment variable passed to the call
        pub fn env(&self, key: &str) -> Option<&str> {
            self.envs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        /// Succeed; `stdout` is returned or written to the output file
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses: program name -> response
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for a specific program
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(program.to_string(), response);
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Check if a program was called
        pub fn was_called(&self, program: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.program == program)
        }

        /// Get number of calls to a specific program
        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        fn record_call(
            &self,
            program: &str,
            args: &[String],
            envs: &[(String, String)],
            output_path: Option<&Path>,
        ) {
            self.calls.lock().unwrap().push(CommandCall {
                program: program.to_string(),
                args: args.to_vec(),
                envs: envs.to_vec(),
                output_path: output_path.map(|p| p.display().to_string()),
            });
        }

        fn get_response(&self, program: &str) -> MockResponse {
            self.responses
                .lock()
                .unwrap()
                .get(program)
                .cloned()
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }

        fn execute_response(&self, response: MockResponse) -> Result<Output> {
            match response {
                MockResponse::Success { stdout, stderr } => Ok(Output {
                    status: std::process::ExitStatus::default(),
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                }),
                MockResponse::Failure { stderr, exit_code } => {
                    anyhow::bail!("Command failed with exit code {:?}: {}", exit_code, stderr)
                }
                MockResponse::Timeout => {
                    anyhow::bail!("Command timed out")
                }
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn run_command(
            &self,
            program: &str,
            args: &[String],
            envs: &[(String, String)],
            _timeout: Option<Duration>,
        ) -> Result<Output> {
            self.record_call(program, args, envs, None);
            let response = self.get_response(program);
            self.execute_response(response)
        }

        async fn run_command_to_file(
            &self,
            program: &str,
            args: &[String],
            envs: &[(String, String)],
            output_path: &Path,
            _timeout: Option<Duration>,
        ) -> Result<u64> {
            self.record_call(program, args, envs, Some(output_path));
            let response = self.get_response(program);
            let output = self.execute_response(response)?;
            std::fs::write(output_path, &output.stdout)?;
            Ok(output.stdout.len() as u64)
        }
    }
}
