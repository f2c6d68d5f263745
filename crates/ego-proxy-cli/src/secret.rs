//! Secret references in configuration values.
//!
//! - `pass::path/in/store`: first line of `pass show path/in/store`
//! - `env::VAR_NAME`: the value of `$VAR_NAME`
//! - anything else: used as-is

use std::fmt;
use std::process::Command;

/// Why a secret reference could not be resolved.
#[derive(Debug)]
pub enum SecretError {
    /// `pass` could not be started.
    PassUnavailable { path: String, source: std::io::Error },
    /// `pass show` exited with an error.
    PassFailed { path: String, stderr: String },
    /// `pass show` printed nothing.
    PassEmpty { path: String },
    /// The referenced environment variable is unset or not unicode.
    EnvMissing { var: String },
}

impl fmt::Display for SecretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassUnavailable { path, source } => {
                write!(f, "failed to run `pass show {}`: {}", path, source)
            }
            Self::PassFailed { path, stderr } => {
                write!(f, "`pass show {}` failed: {}", path, stderr)
            }
            Self::PassEmpty { path } => write!(f, "`pass show {}` produced no output", path),
            Self::EnvMissing { var } => write!(f, "environment variable `{}` is not set", var),
        }
    }
}

impl std::error::Error for SecretError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PassUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Returns true if `value` points at a secret instead of holding it.
pub fn is_reference(value: &str) -> bool {
    value.starts_with("pass::") || value.starts_with("env::")
}

/// Resolves a value that may contain a secret reference prefix.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var).map_err(|_| SecretError::EnvMissing {
            var: var.to_string(),
        })
    } else {
        Ok(value.to_string())
    }
}

fn resolve_pass(path: &str) -> Result<String, SecretError> {
    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|source| SecretError::PassUnavailable {
            path: path.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SecretError::PassFailed {
            path: path.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim_end().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| SecretError::PassEmpty {
            path: path.to_string(),
        })
}

/// Renders a possibly secret value for display: references are shown as
/// written, inline secrets are masked.
pub fn redact(value: &str) -> String {
    if is_reference(value) {
        value.to_string()
    } else {
        "<redacted>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("sk-local").unwrap(), "sk-local");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_prefix_resolves() {
        // PATH is set in any environment the tests run in.
        let expected = std::env::var("PATH").unwrap();
        assert_eq!(resolve("env::PATH").unwrap(), expected);
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let err = resolve("env::_EGO_PROXY_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(matches!(err, SecretError::EnvMissing { .. }));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn pass_prefix_errors_for_unknown_entry() {
        // Fails whether or not `pass` is installed.
        assert!(resolve("pass::nonexistent/ego-proxy/entry/12345").is_err());
    }

    #[test]
    fn redaction() {
        assert!(is_reference("env::OPENAI_API_KEY"));
        assert_eq!(redact("env::OPENAI_API_KEY"), "env::OPENAI_API_KEY");
        assert_eq!(redact("pass::llm/key"), "pass::llm/key");
        assert_eq!(redact("sk-abc"), "<redacted>");
    }
}
