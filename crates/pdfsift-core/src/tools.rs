//! Helpers for external command-line backends (poppler, tesseract).

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::{Command, Output};

use tracing::trace;

use crate::error::DependencyError;

/// Run `program` with `args`, mapping spawn failures to dependency errors.
///
/// A non-zero exit status is returned as-is for the caller to interpret.
pub(crate) fn run<I, S>(program: &str, args: I) -> Result<Output, DependencyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    trace!("Running {:?}", command);

    command.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            DependencyError::not_installed(program, format!("{} not found in PATH", program))
        } else {
            DependencyError::runtime(program, format!("failed to start: {}", e))
        }
    })
}

/// Check that a binary runs, returning the first line of its version output.
pub(crate) fn check_binary(program: &str, version_arg: &str) -> Result<String, DependencyError> {
    let output = run(program, [version_arg])?;

    // poppler tools print their version on stderr
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };

    if !output.status.success() && text.trim().is_empty() {
        return Err(DependencyError::init_failed(
            program,
            format!("{} {} exited with {}", program, version_arg, output.status),
        ));
    }

    Ok(text.lines().next().unwrap_or(program).trim().to_string())
}

/// Stderr of a finished command, trimmed.
pub(crate) fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DependencyFailure;

    #[test]
    fn test_missing_binary_is_not_installed() {
        let err = check_binary("pdfsift-definitely-missing-binary", "--version").unwrap_err();
        assert_eq!(err.reason, DependencyFailure::NotInstalled);
        assert_eq!(err.dependency, "pdfsift-definitely-missing-binary");
    }
}
