//! Presence checks for the external tools the capture pipeline shells out to.

use crate::types::Platform;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const COMMON_COMMANDS: &[&str] = &["node", "npm", "python3", "pip3", "git", "mitmdump"];
const IOS_COMMANDS: &[&str] = &["appium", "xcrun", "xcodebuild"];
const ANDROID_COMMANDS: &[&str] = &["appium", "adb", "emulator", "apktool", "java"];

#[derive(Debug, Clone, Serialize)]
pub struct ToolCheck {
    pub command: String,
    pub path: Option<PathBuf>,
    /// First line of `<command> --version`, when the tool printed one.
    pub version: Option<String>,
}

impl ToolCheck {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

/// Commands required for the given platforms, deduplicated, in check order.
pub fn required_commands(platforms: &[Platform]) -> Vec<&'static str> {
    let mut commands: Vec<&'static str> = COMMON_COMMANDS.to_vec();
    for platform in platforms {
        let extra = match platform {
            Platform::Ios => IOS_COMMANDS,
            Platform::Android => ANDROID_COMMANDS,
        };
        for cmd in extra {
            if !commands.contains(cmd) {
                commands.push(*cmd);
            }
        }
    }
    commands
}

pub fn check<S: AsRef<str>>(commands: &[S]) -> Vec<ToolCheck> {
    commands
        .iter()
        .map(|c| {
            let path = which::which(c.as_ref()).ok();
            let version = path.as_deref().and_then(command_version);
            ToolCheck {
                command: c.as_ref().to_string(),
                path,
                version,
            }
        })
        .collect()
}

/// Run `<program> --version` and return the first non-empty output line.
fn command_version(program: &Path) -> Option<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .ok()?;
    first_line(&output.stdout).or_else(|| first_line(&output.stderr))
}

/// Some tools print their version on stderr, so callers try both streams.
fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
