//! System clipboard via platform shell-out.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Pipe `text` into the platform clipboard command.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("pbcopy")
    } else if cfg!(target_os = "linux") {
        let mut c = Command::new("xclip");
        c.args(["-selection", "clipboard"]);
        c
    } else {
        bail!("clipboard not supported on this platform");
    };

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to run clipboard command")?;

    child
        .stdin
        .take()
        .context("clipboard stdin unavailable")?
        .write_all(text.as_bytes())?;

    let status = child.wait()?;
    if !status.success() {
        bail!("clipboard command exited with {status}");
    }
    Ok(())
}
