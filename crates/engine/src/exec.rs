//! Plugins that run as external programs.
//!
//! Each invocation spawns the program once. The entry is sent on stdin as a
//! single JSON object:
//!
//! ```text
//! {"name":"/a.js","mode":420,"data":"<base64>"}
//! ```
//!
//! The program answers on stdout with zero or more JSON lines, one per write:
//!
//! ```text
//! {"name":"/a.js","data":"<base64>"}
//! {"name":"/a.js.map","data":"<base64>","mode":420}
//! ```
//!
//! The program runs to completion inside the invocation and its writes land
//! in the bundle before the next plugin runs, so exec plugins chain like any
//! synchronous plugin. A non-zero exit status fails the invocation with the
//! program's stderr.

use crate::plugin::{EntryWrite, Plugin, PluginOutcome};
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rebundle_format::{Entry, EntryStore};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tracing::{debug, warn};

/// Request sent to the plugin program.
#[derive(Debug, Serialize)]
struct PluginRequest<'a> {
    name: &'a str,
    mode: u32,
    data: String,
}

/// One write line printed by the plugin program.
#[derive(Debug, Deserialize)]
struct WriteLine {
    name: String,
    data: String,
    #[serde(default)]
    mode: Option<u32>,
}

/// An external program used as a plugin.
#[derive(Debug, Clone)]
pub struct ExecPlugin {
    name: String,
    program: PathBuf,
}

impl ExecPlugin {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }

    /// Run the program once, feeding `request` on stdin while collecting its
    /// output.
    fn execute(&self, request: &[u8]) -> Result<Output> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;
        let mut stdin = child.stdin.take().context("Plugin stdin unavailable")?;

        // stdin must be fed while stdout drains
        let (fed, output) = std::thread::scope(|scope| {
            let feeder = scope.spawn(move || stdin.write_all(request));
            let output = child.wait_with_output();
            (feeder.join(), output)
        });
        let output = output.context("Failed to wait for plugin")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} ({})", output.status, stderr.trim());
        }
        match fed {
            Ok(Ok(())) => {}
            // a program may exit without reading its input
            Ok(Err(e)) => warn!("{} did not read its input: {}", self.name, e),
            Err(_) => bail!("Writing to {} panicked", self.name),
        }
        Ok(output)
    }
}

impl Plugin for ExecPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, store: &mut dyn EntryStore, entry: &Entry) -> Result<PluginOutcome> {
        let request = serde_json::to_vec(&PluginRequest {
            name: &entry.name,
            mode: entry.mode,
            data: STANDARD.encode(&entry.data),
        })?;

        debug!("Running {} on {}", self.name, entry.name);
        let output = self.execute(&request)?;

        let writes = parse_writes(&output.stdout)?;
        debug!("{} made {} writes", self.name, writes.len());
        for write in writes {
            write.apply(store);
        }
        Ok(PluginOutcome::Done)
    }
}

/// Parse the write lines a plugin program printed.
pub fn parse_writes(stdout: &[u8]) -> Result<Vec<EntryWrite>> {
    let text = std::str::from_utf8(stdout).context("Plugin output is not UTF-8")?;

    let mut writes = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: WriteLine = serde_json::from_str(line)
            .with_context(|| format!("Malformed output line {}", number + 1))?;
        let data = STANDARD
            .decode(&parsed.data)
            .with_context(|| format!("Invalid base64 data for '{}'", parsed.name))?;
        writes.push(EntryWrite {
            name: parsed.name,
            data,
            mode: parsed.mode,
        });
    }
    Ok(writes)
}
