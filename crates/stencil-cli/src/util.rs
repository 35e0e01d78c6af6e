//! Small helpers shared by commands

use regex::Regex;
use std::path::Path;
use std::process::Command;

/// Determine the repository's head branch, falling back to `main`
///
/// Asks the `origin` remote first, then looks for well-known local branches.
pub fn head_branch(dir: &Path) -> String {
    if let Ok(output) = Command::new("git")
        .args(["remote", "show", "origin"])
        .current_dir(dir)
        .output()
    {
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(captures) = Regex::new(r"HEAD branch: ([[:alpha:]]+)")
                .ok()
                .and_then(|re| re.captures(&stdout))
            {
                return captures[1].to_string();
            }
        }
    }

    for candidate in ["main", "master"] {
        if dir.join(".git/refs/heads").join(candidate).exists() {
            return candidate.to_string();
        }
    }

    "main".to_string()
}
