//! Custom diagnostic error types for rich error reporting via miette.
//!
//! `SupervisorError` covers the lifecycle taxonomy. `FileError` and
//! `ConfigParseError` cover the settings file.

// False positive: fields are used in #[error] format strings and miette derive macros
#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the process supervisor.
#[derive(Debug, Error, Diagnostic)]
pub enum SupervisorError {
    #[error("syncthing executable not found")]
    #[diagnostic(
        code(syncwarden::supervisor::not_found),
        help(
            "install syncthing or set `manual_path` in the settings file.\nRun `syncwarden detect` to see which locations were searched"
        )
    )]
    NotFound,

    #[error("'{}' is not a usable syncthing executable", path.display())]
    #[diagnostic(
        code(syncwarden::supervisor::verification_failed),
        help("the file exists but `--version` did not identify it as syncthing")
    )]
    VerificationFailed { path: PathBuf },

    #[error("no free port between {start} and {end}")]
    #[diagnostic(
        code(syncwarden::supervisor::port_exhausted),
        help("free a port in that range or change `port` in the settings file")
    )]
    PortExhausted { start: u16, end: u16 },

    #[error("failed to spawn {}", path.display())]
    #[diagnostic(code(syncwarden::supervisor::spawn_failed))]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("syncthing stopped unexpectedly ({})", describe_exit(*code))]
    #[diagnostic(
        code(syncwarden::supervisor::crash_exit),
        help("check the daemon log for details; restart with `syncwarden start`")
    )]
    CrashExit { code: Option<i32> },

    #[error("syncthing is already running on port {port}")]
    #[diagnostic(code(syncwarden::supervisor::already_running))]
    AlreadyRunning { port: u16 },

    #[error("syncthing is not running")]
    #[diagnostic(code(syncwarden::supervisor::not_running))]
    NotRunning,

    #[error("syncthing API request failed: {message}")]
    #[diagnostic(code(syncwarden::supervisor::api))]
    Api { message: String },
}

impl SupervisorError {
    /// Advisory errors are user notices, not failures.
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. } | Self::NotRunning)
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code: {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Error for TOML configuration parse failures with source code highlighting.
#[derive(Debug, Error, Diagnostic)]
#[error("failed to parse settings")]
#[diagnostic(code(syncwarden::config::parse_error))]
pub struct ConfigParseError {
    #[source_code]
    pub src: NamedSource<String>,

    #[label("{message}")]
    pub span: SourceSpan,

    pub message: String,

    #[help]
    pub help: Option<String>,
}

impl ConfigParseError {
    pub fn from_toml_error(path: &std::path::Path, contents: String, err: toml::de::Error) -> Self {
        let message = err.message().to_string();
        let span = err
            .span()
            .map(|r| SourceSpan::from(r.start..r.end))
            .unwrap_or_else(|| SourceSpan::from(0..0));

        Self {
            src: NamedSource::new(path.display().to_string(), contents),
            span,
            message,
            help: Some("check TOML syntax at https://toml.io".to_string()),
        }
    }
}

/// Errors related to the settings file.
#[derive(Debug, Error, Diagnostic)]
pub enum FileError {
    #[error("failed to read file: {}", path.display())]
    #[diagnostic(code(syncwarden::file::read_error))]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file: {}", path.display())]
    #[diagnostic(code(syncwarden::file::write_error))]
    WriteError {
        path: PathBuf,
        #[help]
        details: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_error_display() {
        let err = SupervisorError::PortExhausted {
            start: 8384,
            end: 8483,
        };
        assert_eq!(err.to_string(), "no free port between 8384 and 8483");

        let err = SupervisorError::CrashExit { code: Some(3) };
        assert_eq!(err.to_string(), "syncthing stopped unexpectedly (code: 3)");

        let err = SupervisorError::CrashExit { code: None };
        assert!(err.to_string().contains("signal"));

        let err = SupervisorError::VerificationFailed {
            path: PathBuf::from("/usr/bin/syncthing"),
        };
        assert!(err.to_string().contains("/usr/bin/syncthing"));
    }

    #[test]
    fn test_advisory_errors() {
        assert!(SupervisorError::NotRunning.is_advisory());
        assert!(SupervisorError::AlreadyRunning { port: 8384 }.is_advisory());
        assert!(!SupervisorError::NotFound.is_advisory());
        assert!(!SupervisorError::CrashExit { code: Some(1) }.is_advisory());
    }

    #[test]
    fn test_config_parse_error() {
        let contents = "port = ".to_string();
        let err = toml::from_str::<toml::Value>(&contents).unwrap_err();
        let parse_err =
            ConfigParseError::from_toml_error(std::path::Path::new("settings.toml"), contents, err);

        assert!(parse_err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_file_error_display() {
        let err = FileError::ReadError {
            path: PathBuf::from("/path/to/settings.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("failed to read file"));
        assert!(err.to_string().contains("settings.toml"));
    }
}
