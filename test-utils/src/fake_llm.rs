//! Fake LLM CLI scripts
//!
//! Small shell scripts standing in for the real model CLI so worker and
//! orchestrator tests can exercise the full subprocess path: prologue
//! output, the assistant tag, idle completion, hangs, and timeouts.

use std::path::PathBuf;
use tempfile::TempDir;

/// A scripted stand-in for the LLM CLI, plus a placeholder model file.
pub struct FakeLlm {
    /// Owns the scratch directory for the script and model lifetimes
    pub dir: TempDir,
    /// Path to pass as the worker's executable
    pub executable: PathBuf,
    /// Path to pass as the worker's model weights
    pub model: PathBuf,
}

impl FakeLlm {
    /// Write an executable script with the given body.
    #[must_use]
    pub fn from_script(body: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");

        let executable = dir.path().join("fake-llm.sh");
        let script = format!("#!/bin/sh\n{body}\n");
        std::fs::write(&executable, script).expect("write fake llm script");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&executable, std::fs::Permissions::from_mode(0o755))
                .expect("mark script executable");
        }

        let model = dir.path().join("model.gguf");
        std::fs::write(&model, b"fake weights").expect("write model file");

        Self {
            dir,
            executable,
            model,
        }
    }

    /// Replies immediately: one prologue line, the assistant tag, the
    /// reply, then exit.
    #[must_use]
    pub fn echoing(reply: &str) -> Self {
        let reply = shell_quote(reply);
        Self::from_script(&format!(
            "echo 'loading model weights...'\nprintf 'Assistant: %s\\n' {reply}"
        ))
    }

    /// Holds the worker busy for `delay_ms` before replying, to make pool
    /// contention observable.
    #[must_use]
    pub fn slow(reply: &str, delay_ms: u64) -> Self {
        let reply = shell_quote(reply);
        let delay_s = delay_ms as f64 / 1000.0;
        Self::from_script(&format!(
            "echo 'loading model weights...'\nsleep {delay_s}\nprintf 'Assistant: %s\\n' {reply}"
        ))
    }

    /// Emits a reply whose trailing control token and echoed user turn the
    /// worker must strip.
    #[must_use]
    pub fn noisy(reply: &str) -> Self {
        let reply = shell_quote(reply);
        Self::from_script(&format!(
            "echo 'loading model weights...'\n\
             printf 'Assistant: %s\\n' {reply}\n\
             echo '<|im_end|>'\n\
             echo 'User: next question?'"
        ))
    }

    /// Prints prologue forever without ever emitting the assistant tag;
    /// only the absolute deadline ends the query.
    #[must_use]
    pub fn silent() -> Self {
        Self::from_script(
            "echo 'loading model weights...'\nwhile true; do sleep 1; echo 'still loading'; done",
        )
    }

    /// Emits the tag, one partial line, then stalls mid-generation without
    /// exiting; the idle window should close the answer.
    #[must_use]
    pub fn stalling(partial: &str) -> Self {
        let partial = shell_quote(partial);
        Self::from_script(&format!(
            "echo 'loading model weights...'\n\
             printf 'Assistant: %s\\n' {partial}\n\
             sleep 3600"
        ))
    }

    /// Exits immediately without producing any output.
    #[must_use]
    pub fn mute() -> Self {
        Self::from_script("exit 0")
    }
}

/// Quote a string for safe interpolation into a POSIX shell script.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}
