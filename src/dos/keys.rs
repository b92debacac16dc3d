//! Simulated keyboard input for interactive guest programs.
//!
//! Some DOS tools insist on a keypress ("Insert next disk", license
//! prompts) instead of taking everything on the command line. After boot,
//! `send_keys` reads the Xvfb display number the supervisor published and
//! drives the emulator window with xdotool, one entry at a time.
//!
//! This is a free function rather than a method so the facade can run it
//! concurrently with [`crate::Dos::auto_exec`]: it only touches the port
//! file, never controller state. Injection is best-effort; the run ends
//! via the scripted reboot whether or not every key landed, so failures
//! are logged and skipped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::util::run_command_env;

/// X window class DOSBox registers, used to target xdotool.
const DOSBOX_WINDOW_CLASS: &str = "dosbox";

/// Per-keystroke delay passed to xdotool itself, in milliseconds.
const XDOTOOL_KEY_DELAY: &str = "100";

/// One entry of a key sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyInput {
    /// Literal text, typed character by character.
    Text(String),
    /// A named key or chord in xdotool syntax, e.g. `Return`, `ctrl+c`.
    Key(String),
    /// Wait this many milliseconds before the next entry.
    Pause(u64),
}

/// Timing for a key sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOpts {
    /// Gap between consecutive entries, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Wait before the first entry, giving the guest time to boot to an
    /// interactive prompt. In milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_delay_ms() -> u64 {
    15_000
}

impl Default for KeyOpts {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Send `keys` to the DOSBox window on the display published in
/// `port_file`.
///
/// Sleeps `opts.delay_ms` first. When the port file does not exist the
/// whole call is a no-op: either the guest runs in debug mode on a real
/// display, or it already exited. Entries are processed strictly in
/// order, one at a time.
pub async fn send_keys(port_file: &Path, keys: &[KeyInput], opts: KeyOpts) {
    sleep(Duration::from_millis(opts.delay_ms)).await;

    let display = match tokio::fs::read_to_string(port_file).await {
        Ok(raw) => format!(":{}", raw.trim()),
        Err(_) => {
            debug!(port_file = %port_file.display(), "no display published, skipping key injection");
            return;
        }
    };

    for key in keys {
        let (verb, value) = match key {
            KeyInput::Pause(ms) => {
                sleep(Duration::from_millis(*ms)).await;
                continue;
            }
            KeyInput::Key(sym) => ("key", sym.as_str()),
            KeyInput::Text(text) => ("type", text.as_str()),
        };

        let result = run_command_env(
            "xdotool",
            &[
                "search",
                "--class",
                DOSBOX_WINDOW_CLASS,
                "windowfocus",
                verb,
                "--delay",
                XDOTOOL_KEY_DELAY,
                value,
            ],
            &[("DISPLAY", &display)],
        )
        .await;
        if let Err(e) = result {
            warn!(error = %e, verb, "xdotool failed, continuing with remaining keys");
        }

        if opts.interval_ms > 0 {
            sleep(Duration::from_millis(opts.interval_ms)).await;
        }
    }
}
