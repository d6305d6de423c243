//! One managed handle to the LLM CLI
//!
//! A worker is a reusable invocation descriptor: the child process exists
//! only for the duration of one query. Output parsing walks a small state
//! machine (prologue until the assistant tag, then generation until the
//! child exits, the idle window closes, or the deadline fires).

use crate::constants::{defaults, generation, prompts};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Invocation descriptor shared by every worker in a pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Path to the LLM CLI executable
    pub executable_path: PathBuf,
    /// Path to the model weights
    pub model_path: PathBuf,
    /// Absolute per-query deadline
    pub query_timeout: Duration,
}

/// The outcome of one query.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    /// Cleaned assistant reply (may be empty if the child produced none)
    pub text: String,
    /// True when the absolute deadline cut generation short and `text`
    /// holds a partial answer
    pub timed_out: bool,
}

/// A persistent handle to one LLM CLI instance.
///
/// Health transitions `true -> false` on the first failure and never back;
/// an unhealthy worker refuses further queries. Queries are serialized
/// through an internal mutex, which is what makes pool acquisition mean
/// exclusive use.
pub struct LlmWorker {
    id: usize,
    config: WorkerConfig,
    healthy: AtomicBool,
    disposed: AtomicBool,
    last_used: parking_lot::Mutex<DateTime<Utc>>,
    query_lock: tokio::sync::Mutex<()>,
}

impl LlmWorker {
    /// Create a worker, validating the invocation descriptor.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerSpawnFailed` when either configured path does
    /// not point at an existing file.
    pub fn create(id: usize, config: WorkerConfig) -> Result<Self> {
        if !config.executable_path.is_file() {
            return Err(Error::WorkerSpawnFailed(format!(
                "executable not found: {}",
                config.executable_path.display()
            )));
        }
        if !config.model_path.is_file() {
            return Err(Error::WorkerSpawnFailed(format!(
                "model not found: {}",
                config.model_path.display()
            )));
        }
        debug!("Created worker {}", id);
        Ok(Self {
            id,
            config,
            healthy: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            last_used: parking_lot::Mutex::new(Utc::now()),
            query_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Worker identifier, unique within its pool.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current health. False once any query has failed.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Timestamp of the most recent query acquisition.
    #[must_use]
    pub fn last_used(&self) -> DateTime<Utc> {
        *self.last_used.lock()
    }

    /// Mark the worker as destroyed; all further queries fail with
    /// `WorkerDisposed`.
    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    /// Run one query against the LLM CLI.
    ///
    /// The system prompt and user question are concatenated into the CLI's
    /// prompt argument together with the fixed generation parameters.
    ///
    /// # Errors
    ///
    /// - `Error::WorkerDisposed` after the pool destroyed this worker
    /// - `Error::WorkerUnhealthy` when a prior query failed
    /// - `Error::WorkerSpawnFailed` when the child cannot be started
    /// - `Error::WorkerTimeout` when the deadline fires before any answer
    /// - `Error::Cancelled` when the token fires; the child is killed
    pub async fn query(
        &self,
        system_prompt: &str,
        user_question: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::WorkerDisposed);
        }
        if !self.is_healthy() {
            return Err(Error::WorkerUnhealthy);
        }

        let _serial = self.query_lock.lock().await;
        *self.last_used.lock() = Utc::now();

        let result = self.run_child(system_prompt, user_question, cancel).await;
        if let Err(ref err) = result {
            if !matches!(err, Error::Cancelled) {
                warn!("Worker {} query failed, marking unhealthy: {}", self.id, err);
                self.healthy.store(false, Ordering::Release);
            }
        }
        result
    }

    /// Spawn the child and drive the output state machine to completion.
    async fn run_child(
        &self,
        system_prompt: &str,
        user_question: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse> {
        let prompt = format!("{system_prompt}\n\nUser: {user_question}\nAssistant:");

        let mut child = Command::new(&self.config.executable_path)
            .arg("-m")
            .arg(&self.config.model_path)
            .arg("-p")
            .arg(&prompt)
            .arg("-n")
            .arg(generation::MAX_TOKENS.to_string())
            .arg("--temp")
            .arg(generation::TEMPERATURE.to_string())
            .arg("--top-p")
            .arg(generation::TOP_P.to_string())
            .arg("--top-k")
            .arg(generation::TOP_K.to_string())
            .arg("--repeat-penalty")
            .arg(generation::REPEAT_PENALTY.to_string())
            .arg("--presence-penalty")
            .arg(generation::PRESENCE_PENALTY.to_string())
            .arg("--frequency-penalty")
            .arg(generation::FREQUENCY_PENALTY.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::WorkerSpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::WorkerSpawnFailed("child stdout not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        let deadline = Instant::now() + self.config.query_timeout;
        let mut idle_deadline = Instant::now() + self.config.query_timeout;
        let mut generating = false;
        let mut answer = String::new();

        let mut prologue_ticks = tokio::time::interval(defaults::PROLOGUE_TICK_INTERVAL);
        prologue_ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        prologue_ticks.tick().await; // first tick fires immediately; swallow it

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Worker {} cancelled, killing child", self.id);
                    let _ = child.start_kill();
                    return Err(Error::Cancelled);
                }
                () = tokio::time::sleep_until(deadline) => {
                    let _ = child.start_kill();
                    let text = clean_answer(&answer);
                    if text.is_empty() {
                        return Err(Error::WorkerTimeout(
                            self.config.query_timeout.as_millis() as u64,
                        ));
                    }
                    warn!("Worker {} deadline fired mid-answer, returning partial reply", self.id);
                    return Ok(QueryResponse { text, timed_out: true });
                }
                () = tokio::time::sleep_until(idle_deadline), if generating => {
                    debug!("Worker {} idle window closed, answer complete", self.id);
                    let _ = child.start_kill();
                    return Ok(QueryResponse { text: clean_answer(&answer), timed_out: false });
                }
                _ = prologue_ticks.tick(), if !generating => {
                    info!("Worker {} loading model...", self.id);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if generating {
                            if !answer.is_empty() {
                                answer.push('\n');
                            }
                            answer.push_str(&line);
                        } else if let Some(tag_pos) = find_assistant_tag(&line) {
                            generating = true;
                            answer.push_str(line[tag_pos + prompts::ASSISTANT_TAG.len()..].trim_start());
                            debug!("Worker {} saw assistant tag, generation started", self.id);
                        }
                        if generating {
                            idle_deadline =
                                Instant::now() + defaults::GENERATION_IDLE_WINDOW;
                        }
                    }
                    Ok(None) => {
                        // Child closed stdout; generation is over either way.
                        let _ = child.wait().await;
                        return Ok(QueryResponse { text: clean_answer(&answer), timed_out: false });
                    }
                    Err(e) => {
                        let _ = child.start_kill();
                        return Err(Error::Io(e));
                    }
                }
            }
        }
    }
}

/// Locate the case-insensitive assistant tag in one output line, returning
/// its byte offset.
fn find_assistant_tag(line: &str) -> Option<usize> {
    let tag = prompts::ASSISTANT_TAG.as_bytes();
    line.as_bytes()
        .windows(tag.len())
        .position(|window| window.eq_ignore_ascii_case(tag))
}

/// Strip trailing control artifacts from a raw answer: everything from the
/// first control-token prefix, everything from a later user turn, then
/// surrounding whitespace.
fn clean_answer(raw: &str) -> String {
    let mut text = raw;
    if let Some(pos) = text.find(prompts::CONTROL_TOKEN_PREFIX) {
        text = &text[..pos];
    }
    if let Some(pos) = text.find(prompts::USER_TAG) {
        text = &text[..pos];
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_assistant_tag_is_case_insensitive() {
        assert_eq!(find_assistant_tag("ASSISTANT: hi"), Some(0));
        assert_eq!(find_assistant_tag("...loading... assistant: hi"), Some(14));
        assert_eq!(find_assistant_tag("no tag here"), None);
    }

    #[test]
    fn test_clean_answer_strips_control_tokens() {
        assert_eq!(clean_answer("Roll 2d6.<|endoftext|>"), "Roll 2d6.");
        assert_eq!(clean_answer("  Roll 2d6.  "), "Roll 2d6.");
    }

    #[test]
    fn test_clean_answer_strips_trailing_user_turn() {
        assert_eq!(
            clean_answer("Roll 2d6.\nUser: and how do I defend?"),
            "Roll 2d6."
        );
    }

    #[test]
    fn test_clean_answer_applies_both_cuts() {
        assert_eq!(
            clean_answer("Roll 2d6.\n<|im_end|>\nUser: next"),
            "Roll 2d6."
        );
    }

    #[test]
    fn test_create_rejects_missing_executable() {
        let config = WorkerConfig {
            executable_path: PathBuf::from("/nonexistent/llm-cli"),
            model_path: PathBuf::from("/nonexistent/model.gguf"),
            query_timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            LlmWorker::create(0, config),
            Err(Error::WorkerSpawnFailed(_))
        ));
    }
}
