//! UCI engine process wrapper.
//!
//! Owns a single external engine for one analysis session. The UCI protocol
//! is strictly sequential: exactly one `go` may be in flight, and the next
//! request may only be sent after the terminal `bestmove` line arrives.
//! Every public method upholds that invariant, including the timeout path,
//! which stops the search and drains to `bestmove` before returning.
//!
//! Engine output is consumed by a dedicated reader thread feeding a channel,
//! which is what lets evaluation block with a deadline instead of hanging
//! forever on a wedged engine.

use crate::config::{EngineConfig, SearchLimit};
use crate::evaluation::Evaluation;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Grace period for draining to `bestmove` after a `stop` command.
const STOP_DRAIN_MS: u64 = 1_000;

/// Errors that can occur when working with the engine process.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine process.
    #[error("Failed to spawn engine: {0}")]
    SpawnError(#[from] std::io::Error),
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// The UCI handshake did not complete within the initialization budget.
    #[error("Engine initialization timed out")]
    InitTimeout,
    /// The engine process exited or closed its output stream.
    #[error("Engine process exited unexpectedly")]
    ProcessExited,
    /// Engine returned an invalid or unexpected response.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

/// Result of evaluating one position.
///
/// `evaluation` is relative to the side to move in the evaluated position.
/// A timed-out search reports whatever partial score was last observed;
/// `evaluation` is `None` only when not a single score line arrived.
#[derive(Debug, Clone)]
pub struct PositionEvaluation {
    /// The raw engine evaluation, if any score line was seen.
    pub evaluation: Option<Evaluation>,
    /// The best move in UCI notation, if reported.
    pub best_move: Option<String>,
    /// The deepest search depth reached.
    pub depth: u32,
    /// Nodes searched.
    pub nodes: u64,
    /// Principal variation of the best line.
    pub pv: Vec<String>,
    /// True if the per-position budget expired before `bestmove`.
    pub timed_out: bool,
}

/// One entry of an [`UciEngine::analyze_line`] walk: the evaluation of the
/// position reached after `ply` half-moves from the starting position.
#[derive(Debug, Clone)]
pub struct LineEvaluation {
    /// Half-moves played from the start position (0 = start).
    pub ply: usize,
    /// The evaluation of that position.
    pub result: PositionEvaluation,
}

/// Wrapper around one UCI engine process.
///
/// Engine options (thread count, hash size) are fixed at initialization and
/// never changed mid-session; reproducible classification depends on it.
/// The process is terminated on every exit path via [`Drop`].
pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    reader: Option<JoinHandle<()>>,
    name: String,
    search: SearchLimit,
    position_timeout: Duration,
    closed: bool,
}

impl UciEngine {
    /// Spawns the engine and completes the UCI handshake.
    ///
    /// Sets deterministic options (single search thread, fixed hash) and
    /// fences with `isready`. The whole initialization is bounded by
    /// `config.init_timeout_ms`; on failure the caller is expected to
    /// proceed in degraded skip-analysis mode rather than aborting.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let path = config.path.as_path();
        let looks_like_path = path.components().count() > 1;
        if looks_like_path && !path.exists() {
            return Err(EngineError::NotFound(path.display().to_string()));
        }

        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = process.stdin.take().ok_or(EngineError::ProcessExited)?;
        let stdout = process.stdout.take().ok_or(EngineError::ProcessExited)?;

        let (tx, rx) = mpsc::channel();
        let reader = std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut engine = Self {
            process,
            stdin,
            lines: rx,
            reader: Some(reader),
            name: String::new(),
            search: config.search,
            position_timeout: Duration::from_millis(config.position_timeout_ms),
            closed: false,
        };

        let deadline = Instant::now() + Duration::from_millis(config.init_timeout_ms);
        engine.handshake(deadline)?;
        engine.send(&format!("setoption name Threads value {}", config.threads))?;
        engine.send(&format!("setoption name Hash value {}", config.hash_mb))?;
        engine.send("ucinewgame")?;
        engine.ready_fence(deadline)?;

        debug!(name = %engine.name, "Engine initialized");
        Ok(engine)
    }

    /// Sends `uci` and consumes identification lines until `uciok`.
    fn handshake(&mut self, deadline: Instant) -> Result<(), EngineError> {
        self.send("uci")?;
        loop {
            let line = self.recv_until(deadline)?;
            if let Some(name) = line.strip_prefix("id name ") {
                self.name = name.to_string();
            } else if line == "uciok" {
                break;
            }
        }
        if self.name.is_empty() {
            self.name = "Unknown Engine".to_string();
        }
        Ok(())
    }

    /// Sends `isready` and waits for `readyok`.
    fn ready_fence(&mut self, deadline: Instant) -> Result<(), EngineError> {
        self.send("isready")?;
        loop {
            if self.recv_until(deadline)? == "readyok" {
                break;
            }
        }
        Ok(())
    }

    /// Returns the engine name from the `id name` handshake line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clears engine state between games and fences on readiness.
    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.send("ucinewgame")?;
        self.ready_fence(Instant::now() + self.position_timeout)
    }

    /// Evaluates a FEN position with the session's configured search limit.
    pub fn evaluate(&mut self, fen: &str) -> Result<PositionEvaluation, EngineError> {
        self.send(&format!("position fen {}", fen))?;
        self.search_current()
    }

    /// Evaluates the position reached from `start_fen` after `moves`
    /// (UCI notation). An empty move list evaluates the start position.
    pub fn evaluate_after(
        &mut self,
        start_fen: &str,
        moves: &[String],
    ) -> Result<PositionEvaluation, EngineError> {
        if moves.is_empty() {
            self.send(&format!("position fen {}", start_fen))?;
        } else {
            self.send(&format!("position fen {} moves {}", start_fen, moves.join(" ")))?;
        }
        self.search_current()
    }

    /// Walks a move list, evaluating the position before the first move and
    /// after every ply. Returns one evaluation-only record per position, in
    /// order; classification is a separate layer.
    pub fn analyze_line(
        &mut self,
        start_fen: &str,
        moves: &[String],
    ) -> Result<Vec<LineEvaluation>, EngineError> {
        let mut results = Vec::with_capacity(moves.len() + 1);
        for ply in 0..=moves.len() {
            let result = self.evaluate_after(start_fen, &moves[..ply])?;
            results.push(LineEvaluation { ply, result });
        }
        Ok(results)
    }

    /// Issues `go` for the previously sent position and parses streamed
    /// output until the terminal `bestmove` line or the per-position budget
    /// expires. On timeout the search is stopped, output is drained to keep
    /// the protocol sequential, and the last partial score is returned.
    fn search_current(&mut self) -> Result<PositionEvaluation, EngineError> {
        self.send(&format!("go {}", self.search.to_go_args()))?;

        let deadline = Instant::now() + self.position_timeout;
        let mut partial = PositionEvaluation {
            evaluation: None,
            best_move: None,
            depth: 0,
            nodes: 0,
            pv: Vec::new(),
            timed_out: false,
        };

        loop {
            match self.recv_deadline(deadline) {
                Ok(line) => {
                    if line.starts_with("info ") {
                        if let Some((depth, eval, nodes, pv)) = parse_info_line(&line) {
                            partial.depth = depth;
                            partial.evaluation = Some(eval);
                            partial.nodes = nodes;
                            if !pv.is_empty() {
                                partial.pv = pv;
                            }
                        }
                    } else if let Some(rest) = line.strip_prefix("bestmove ") {
                        let mv = rest.split_whitespace().next().unwrap_or("");
                        if !mv.is_empty() && mv != "(none)" {
                            partial.best_move = Some(mv.to_string());
                        }
                        return Ok(partial);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Per-position budget expired, stopping search");
                    partial.timed_out = true;
                    self.stop_and_drain(&mut partial)?;
                    return Ok(partial);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::ProcessExited);
                }
            }
        }
    }

    /// Sends `stop` and drains output until `bestmove` so the next request
    /// starts from a clean protocol state.
    fn stop_and_drain(&mut self, partial: &mut PositionEvaluation) -> Result<(), EngineError> {
        self.send("stop")?;
        let drain_deadline = Instant::now() + Duration::from_millis(STOP_DRAIN_MS);
        loop {
            match self.recv_deadline(drain_deadline) {
                Ok(line) => {
                    if line.starts_with("info ") {
                        if let Some((depth, eval, nodes, pv)) = parse_info_line(&line) {
                            partial.depth = depth;
                            partial.evaluation = Some(eval);
                            partial.nodes = nodes;
                            if !pv.is_empty() {
                                partial.pv = pv;
                            }
                        }
                    } else if let Some(rest) = line.strip_prefix("bestmove ") {
                        let mv = rest.split_whitespace().next().unwrap_or("");
                        if !mv.is_empty() && mv != "(none)" && partial.best_move.is_none() {
                            partial.best_move = Some(mv.to_string());
                        }
                        return Ok(());
                    }
                }
                // A wedged engine never acknowledges the stop; give up and
                // let the next request fail on its own terms.
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::ProcessExited),
            }
        }
    }

    /// Terminates the engine. Idempotent; also invoked by [`Drop`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.send("quit");
        let _ = self.process.wait();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }

    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn recv_deadline(&self, deadline: Instant) -> Result<String, RecvTimeoutError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.lines.recv_timeout(remaining)
    }

    fn recv_until(&self, deadline: Instant) -> Result<String, EngineError> {
        match self.recv_deadline(deadline) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::InitTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::ProcessExited),
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parses a UCI info line into (depth, evaluation, nodes, pv).
///
/// Format: `info depth X score cp Y nodes Z pv move1 move2 ...` or with
/// `score mate Y`. Returns `None` when depth or score is missing.
fn parse_info_line(line: &str) -> Option<(u32, Evaluation, u64, Vec<String>)> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let mut depth: Option<u32> = None;
    let mut cp: Option<i32> = None;
    let mut mate: Option<i32> = None;
    let mut nodes: u64 = 0;
    let mut pv: Vec<String> = Vec::new();
    let mut in_pv = false;

    let mut i = 0;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                if i + 1 < parts.len() {
                    depth = parts[i + 1].parse().ok();
                    i += 1;
                }
            }
            "score" => {
                if i + 2 < parts.len() {
                    match parts[i + 1] {
                        "cp" => {
                            cp = parts[i + 2].parse().ok();
                            i += 2;
                        }
                        "mate" => {
                            mate = parts[i + 2].parse().ok();
                            i += 2;
                        }
                        _ => {}
                    }
                }
            }
            "nodes" => {
                if i + 1 < parts.len() {
                    nodes = parts[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "pv" => {
                in_pv = true;
            }
            _ => {
                if in_pv {
                    pv.push(parts[i].to_string());
                }
            }
        }
        i += 1;
    }

    let d = depth?;
    let eval = Evaluation::from_uci_score(cp, mate)?;
    Some((d, eval, nodes, pv))
}
