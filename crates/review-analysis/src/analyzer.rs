//! Game analysis orchestration.
//!
//! Drives every ply of a game through evaluation, classification, and the
//! two detectors, producing one immutable [`MoveRecord`] per move plus the
//! tactical and free-piece event lists. A single failed ply never aborts
//! the run: failures are captured per ply and surfaced in an aggregate
//! error list on the report.

use review_core::{BoardView, Color, RulesEngine, StandardRules, UciMove, STARTPOS_FEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::accuracy::{aggregate_accuracy, volatilities};
use crate::config::ReviewConfig;
use crate::engine::{PositionEvaluation, UciEngine};
use crate::evaluation::{centipawn_loss, to_mover_perspective, to_white_perspective};
use crate::free_piece::{detect_free_piece, FreePieceEvent};
use crate::quality::{classify, cp_to_win_probability, move_accuracy, MoveQuality};
use crate::tactics::{detect_opportunity, TacticalOpportunity};

/// Hard failures that abort a whole analysis run.
///
/// Per-move failures never surface here; they are recorded as [`PlyError`]
/// entries on the report instead.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// The starting position could not be set up.
    #[error("Invalid game data: {0}")]
    InvalidGame(String),
}

/// Soft-failure categories captured per ply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlyErrorKind {
    /// The engine never became available; the session ran in skip-analysis
    /// mode.
    EngineUnavailable,
    /// One position exceeded its evaluation budget; a partial score may
    /// still have been recorded.
    EvaluationTimeout,
    /// The rules engine rejected the move; this ply and all following plies
    /// carry no analysis.
    InvalidMove,
    /// The engine failed mid-session; remaining plies carry no analysis.
    EngineFailure,
}

/// One recorded per-ply failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlyError {
    /// Ply number (1-based); 0 marks session-level conditions.
    pub ply: usize,
    /// Failure category.
    pub kind: PlyErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// Analysis record for one ply, immutable once built.
///
/// Evaluations and win probabilities are from White's perspective,
/// sentinel-encoded for mate. Analysis fields are `None` whenever their
/// inputs were unavailable; a missing `quality` means "unknown", never
/// "good".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Ply number, 1-based.
    pub ply: usize,
    /// The move as given in the input.
    pub move_san: String,
    /// The move in UCI notation, when the rules engine resolved it.
    pub move_uci: Option<String>,
    /// Who moved.
    pub color: Color,
    /// Position before the move, when known.
    pub fen_before: Option<String>,
    /// Position after the move, when known.
    pub fen_after: Option<String>,
    /// White-perspective evaluation before the move.
    pub eval_before_cp: Option<i32>,
    /// White-perspective evaluation after the move.
    pub eval_after_cp: Option<i32>,
    /// The engine's preferred move in the pre-move position.
    pub best_move: Option<String>,
    /// Clamped centipawn loss for the mover.
    pub centipawn_loss: Option<i32>,
    /// White's win probability before the move.
    pub win_prob_before: Option<f64>,
    /// White's win probability after the move.
    pub win_prob_after: Option<f64>,
    /// Per-move accuracy, 0-100.
    pub accuracy: Option<f64>,
    /// Quality label; `None` when inputs were missing or the position was
    /// already decided.
    pub quality: Option<MoveQuality>,
    /// Engine continuation after the best move, in UCI notation.
    pub alternatives: Vec<String>,
}

/// Per-color summary counts over one game's records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Moves with a quality label.
    pub classified_moves: u32,
    /// Number of best moves.
    pub best_moves: u32,
    /// Number of excellent moves.
    pub excellent_moves: u32,
    /// Number of good moves.
    pub good_moves: u32,
    /// Number of inaccuracies.
    pub inaccuracies: u32,
    /// Number of mistakes.
    pub mistakes: u32,
    /// Number of blunders.
    pub blunders: u32,
    /// Mean clamped centipawn loss over analyzed moves.
    pub avg_cp_loss: f64,
    /// Volatility-weighted game accuracy, 0-100.
    pub accuracy_percent: f64,
}

impl PlayerStats {
    fn from_records<'a, I>(records: I, accuracy_percent: f64) -> Self
    where
        I: Iterator<Item = &'a MoveRecord>,
    {
        let mut stats = PlayerStats {
            accuracy_percent,
            ..PlayerStats::default()
        };
        let mut loss_sum: i64 = 0;
        let mut loss_count: u32 = 0;
        for record in records {
            if let Some(loss) = record.centipawn_loss {
                loss_sum += i64::from(loss);
                loss_count += 1;
            }
            let Some(quality) = record.quality else {
                continue;
            };
            stats.classified_moves += 1;
            match quality {
                MoveQuality::Best => stats.best_moves += 1,
                MoveQuality::Excellent => stats.excellent_moves += 1,
                MoveQuality::Good => stats.good_moves += 1,
                MoveQuality::Inaccuracy => stats.inaccuracies += 1,
                MoveQuality::Mistake => stats.mistakes += 1,
                MoveQuality::Blunder => stats.blunders += 1,
            }
        }
        if loss_count > 0 {
            stats.avg_cp_loss = loss_sum as f64 / f64::from(loss_count);
        }
        stats
    }
}

/// Complete analysis of one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameReport {
    /// Engine identification from the handshake, when available.
    pub engine_name: Option<String>,
    /// One record per input ply, in ply order.
    pub moves: Vec<MoveRecord>,
    /// Tactical opportunities for the tracked player.
    pub tactics: Vec<TacticalOpportunity>,
    /// Free-piece events offered to the tracked player.
    pub free_pieces: Vec<FreePieceEvent>,
    /// White's aggregate statistics.
    pub white_stats: PlayerStats,
    /// Black's aggregate statistics.
    pub black_stats: PlayerStats,
    /// Per-ply failures accumulated during the run.
    pub errors: Vec<PlyError>,
}

/// Orchestrates per-game analysis over one exclusive engine session.
///
/// When the engine fails to initialize the analyzer still constructs, in
/// degraded skip-analysis mode: every record carries null analysis fields
/// and the report's error list says why.
pub struct GameAnalyzer<R: RulesEngine = StandardRules> {
    engine: Option<UciEngine>,
    startup_error: Option<String>,
    rules: R,
    config: ReviewConfig,
}

impl GameAnalyzer<StandardRules> {
    /// Creates an analyzer backed by the built-in rules implementation.
    pub fn new(config: ReviewConfig) -> Self {
        Self::with_rules(config, StandardRules)
    }
}

impl<R: RulesEngine> GameAnalyzer<R> {
    /// Creates an analyzer with an explicit rules implementation.
    pub fn with_rules(config: ReviewConfig, rules: R) -> Self {
        let (engine, startup_error) = match UciEngine::start(&config.engine) {
            Ok(engine) => {
                info!(name = %engine.name(), "Analysis engine ready");
                (Some(engine), None)
            }
            Err(err) => {
                warn!(error = %err, "Engine unavailable, running in degraded mode");
                (None, Some(err.to_string()))
            }
        };
        Self {
            engine,
            startup_error,
            rules,
            config,
        }
    }

    /// Returns the engine identification, when the engine started.
    pub fn engine_name(&self) -> Option<&str> {
        self.engine.as_ref().map(UciEngine::name)
    }

    /// Analyzes one game from the standard starting position.
    ///
    /// `moves` are SAN moves in game order. `tracked` opts into tactical
    /// and free-piece detection for that color; `None` skips detection.
    pub fn analyze_game(
        &mut self,
        moves: &[String],
        tracked: Option<Color>,
    ) -> Result<GameReport, AnalyzerError> {
        self.analyze_game_from(STARTPOS_FEN, moves, tracked)
    }

    /// Analyzes one game from an arbitrary starting position.
    pub fn analyze_game_from(
        &mut self,
        start_fen: &str,
        moves: &[String],
        tracked: Option<Color>,
    ) -> Result<GameReport, AnalyzerError> {
        let mut board = self
            .rules
            .board_from_fen(start_fen)
            .map_err(|e| AnalyzerError::InvalidGame(e.to_string()))?;

        let mut errors: Vec<PlyError> = Vec::new();
        if let Some(message) = &self.startup_error {
            errors.push(PlyError {
                ply: 0,
                kind: PlyErrorKind::EngineUnavailable,
                message: message.clone(),
            });
        }
        if let Some(engine) = self.engine.as_mut() {
            if let Err(err) = engine.new_game() {
                warn!(error = %err, "Engine lost before analysis, degrading");
                errors.push(PlyError {
                    ply: 0,
                    kind: PlyErrorKind::EngineFailure,
                    message: err.to_string(),
                });
                self.engine = None;
            }
        }

        let mut records: Vec<MoveRecord> = Vec::with_capacity(moves.len());
        let mut tactics: Vec<TacticalOpportunity> = Vec::new();
        let mut free_pieces: Vec<FreePieceEvent> = Vec::new();

        // The post-move evaluation of ply N is the pre-move evaluation of
        // ply N+1; carrying it over halves the number of searches.
        let mut carried: Option<PositionEvaluation> = None;
        // Last post-move evaluation per color, mover perspective. Feeds the
        // tactics significance floor.
        let mut last_eval_by_color: [Option<i32>; 2] = [None, None];

        for (idx, san) in moves.iter().enumerate() {
            let ply = idx + 1;
            let mover = board.side_to_move();
            let fen_before = self.rules.to_fen(&board);

            let played = match self.rules.resolve_san(&board, san) {
                Ok(mv) => mv,
                Err(err) => {
                    // The rest of the line is unreachable from a broken
                    // position; emit null records for every remaining ply.
                    warn!(ply, %san, error = %err, "Move rejected, truncating analysis");
                    errors.push(PlyError {
                        ply,
                        kind: PlyErrorKind::InvalidMove,
                        message: format!("{}: {}", san, err),
                    });
                    let mut color = mover;
                    for (null_idx, null_san) in moves.iter().enumerate().skip(idx) {
                        records.push(null_record(null_idx + 1, null_san, color));
                        color = color.opposite();
                    }
                    break;
                }
            };

            let board_after = match self.rules.apply(&board, played) {
                Ok(after) => after,
                Err(err) => {
                    warn!(ply, %san, error = %err, "Move rejected, truncating analysis");
                    errors.push(PlyError {
                        ply,
                        kind: PlyErrorKind::InvalidMove,
                        message: format!("{}: {}", san, err),
                    });
                    let mut color = mover;
                    for (null_idx, null_san) in moves.iter().enumerate().skip(idx) {
                        records.push(null_record(null_idx + 1, null_san, color));
                        color = color.opposite();
                    }
                    break;
                }
            };
            let fen_after = self.rules.to_fen(&board_after);

            let before = match carried.take() {
                Some(eval) => Some(eval),
                None => self.evaluate(&fen_before, ply, &mut errors),
            };
            let after = self.evaluate(&fen_after, ply, &mut errors);

            let mate_score = self.config.classify.mate_score;
            // The pre-move score is relative to the mover, the post-move
            // score to the opponent.
            let eval_before_white = before
                .as_ref()
                .and_then(|e| e.evaluation)
                .map(|e| to_white_perspective(e.to_centipawns(mate_score), mover));
            let eval_after_white = after
                .as_ref()
                .and_then(|e| e.evaluation)
                .map(|e| to_white_perspective(e.to_centipawns(mate_score), mover.opposite()));

            let best_move = before.as_ref().and_then(|e| e.best_move.clone());
            let alternatives = before
                .as_ref()
                .map(|e| e.pv.iter().skip(1).cloned().collect())
                .unwrap_or_default();

            // Classification is skipped entirely when either evaluation is
            // missing; an unlabeled move means "unknown", never "good".
            let mut record = MoveRecord {
                ply,
                move_san: san.clone(),
                move_uci: Some(played.to_uci()),
                color: mover,
                fen_before: Some(fen_before.clone()),
                fen_after: Some(fen_after.clone()),
                eval_before_cp: eval_before_white,
                eval_after_cp: eval_after_white,
                best_move: best_move.clone(),
                centipawn_loss: None,
                win_prob_before: None,
                win_prob_after: None,
                accuracy: None,
                quality: None,
                alternatives,
            };

            if let (Some(before_white), Some(after_white)) = (eval_before_white, eval_after_white) {
                let cfg = &self.config.classify;
                let before_mover = to_mover_perspective(before_white, mover);
                let after_mover = to_mover_perspective(after_white, mover);
                let cp_loss = centipawn_loss(before_white, after_white, mover, cfg);

                let wp_before_mover = cp_to_win_probability(before_mover, cfg);
                let wp_after_mover = cp_to_win_probability(after_mover, cfg);
                let drop = (wp_before_mover - wp_after_mover).max(0.0);

                record.centipawn_loss = Some(cp_loss);
                record.win_prob_before = Some(cp_to_win_probability(before_white, cfg));
                record.win_prob_after = Some(cp_to_win_probability(after_white, cfg));
                record.accuracy = Some(move_accuracy(wp_before_mover, wp_after_mover));
                record.quality = classify(drop, before_mover, after_mover, cp_loss, cfg);

                if tracked == Some(mover) {
                    let gain = before_mover - last_eval_by_color[mover as usize].unwrap_or(0);
                    let best_uci = best_move.as_deref().and_then(UciMove::from_uci);
                    if let Some(best) = best_uci {
                        if let Some(opportunity) = detect_opportunity(
                            &self.rules,
                            &board,
                            best,
                            played,
                            gain,
                            mover,
                            ply,
                            &fen_before,
                            &self.config.tactics,
                        ) {
                            debug!(ply, tactic = %opportunity.tactic_type, "Tactical opportunity");
                            tactics.push(opportunity);
                        }
                    }
                }

                last_eval_by_color[mover as usize] = Some(after_mover);
            }

            // Free pieces are judged from the tracked player's seat, right
            // after the opponent moved, against the reply actually played.
            // The final ply has no reply and is skipped.
            if tracked == Some(mover.opposite()) && idx + 1 < moves.len() {
                let reply = self
                    .rules
                    .resolve_san(&board_after, &moves[idx + 1])
                    .ok();
                let reply_alternatives: Vec<String> = after
                    .as_ref()
                    .and_then(|e| e.best_move.clone())
                    .into_iter()
                    .collect();
                if let Some(event) = detect_free_piece(
                    &self.rules,
                    &board_after,
                    reply,
                    &reply_alternatives,
                    mover.opposite(),
                    ply,
                    &fen_after,
                ) {
                    debug!(ply, square = %event.piece_square, "Free piece");
                    free_pieces.push(event);
                }
            }

            records.push(record);
            carried = after;
            board = board_after;
        }

        let report = self.build_report(records, tactics, free_pieces, errors);
        info!(
            moves = report.moves.len(),
            errors = report.errors.len(),
            white_accuracy = report.white_stats.accuracy_percent,
            black_accuracy = report.black_stats.accuracy_percent,
            "Game analysis complete"
        );
        Ok(report)
    }

    /// Evaluates one position, recording soft failures and degrading the
    /// session when the engine dies.
    fn evaluate(
        &mut self,
        fen: &str,
        ply: usize,
        errors: &mut Vec<PlyError>,
    ) -> Option<PositionEvaluation> {
        let engine = self.engine.as_mut()?;
        match engine.evaluate(fen) {
            Ok(result) => {
                if result.timed_out {
                    errors.push(PlyError {
                        ply,
                        kind: PlyErrorKind::EvaluationTimeout,
                        message: format!("position budget expired at depth {}", result.depth),
                    });
                }
                Some(result)
            }
            Err(err) => {
                warn!(ply, error = %err, "Engine failed, degrading for the rest of the game");
                errors.push(PlyError {
                    ply,
                    kind: PlyErrorKind::EngineFailure,
                    message: err.to_string(),
                });
                self.engine = None;
                None
            }
        }
    }

    fn build_report(
        &self,
        records: Vec<MoveRecord>,
        tactics: Vec<TacticalOpportunity>,
        free_pieces: Vec<FreePieceEvent>,
        errors: Vec<PlyError>,
    ) -> GameReport {
        // Volatility is computed over the game-wide win-probability curve,
        // then sampled at each player's own plies.
        let wp_series: Vec<f64> = records
            .iter()
            .map(|r| r.win_prob_after.unwrap_or(50.0))
            .collect();
        let vols = volatilities(&wp_series);

        let mut accs: [Vec<f64>; 2] = [Vec::new(), Vec::new()];
        let mut acc_vols: [Vec<f64>; 2] = [Vec::new(), Vec::new()];
        for (record, vol) in records.iter().zip(&vols) {
            // Only gate-passed moves count toward game accuracy: when the
            // contestability gate withheld a label, the move's accuracy is
            // noise in an already-decided position.
            if record.quality.is_none() {
                continue;
            }
            if let Some(acc) = record.accuracy {
                accs[record.color as usize].push(acc);
                acc_vols[record.color as usize].push(*vol);
            }
        }
        let white_accuracy = aggregate_accuracy(
            &accs[Color::White as usize],
            &acc_vols[Color::White as usize],
        );
        let black_accuracy = aggregate_accuracy(
            &accs[Color::Black as usize],
            &acc_vols[Color::Black as usize],
        );

        let white_stats = PlayerStats::from_records(
            records.iter().filter(|r| r.color == Color::White),
            white_accuracy,
        );
        let black_stats = PlayerStats::from_records(
            records.iter().filter(|r| r.color == Color::Black),
            black_accuracy,
        );

        GameReport {
            engine_name: self.engine.as_ref().map(|e| e.name().to_string()),
            moves: records,
            tactics,
            free_pieces,
            white_stats,
            black_stats,
            errors,
        }
    }

    /// Terminates the engine session. Also happens on drop.
    pub fn close(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.close();
        }
    }
}

fn null_record(ply: usize, san: &str, color: Color) -> MoveRecord {
    MoveRecord {
        ply,
        move_san: san.to_string(),
        move_uci: None,
        color,
        fen_before: None,
        fen_after: None,
        eval_before_cp: None,
        eval_after_cp: None,
        best_move: None,
        centipawn_loss: None,
        win_prob_before: None,
        win_prob_after: None,
        accuracy: None,
        quality: None,
        alternatives: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn degraded_analyzer() -> GameAnalyzer {
        let config = ReviewConfig {
            engine: EngineConfig {
                path: "/nonexistent/engine/binary".into(),
                ..EngineConfig::default()
            },
            ..ReviewConfig::default()
        };
        GameAnalyzer::new(config)
    }

    fn moves(sans: &[&str]) -> Vec<String> {
        sans.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn degraded_mode_produces_null_records() {
        let mut analyzer = degraded_analyzer();
        assert!(analyzer.engine_name().is_none());

        let report = analyzer
            .analyze_game(&moves(&["e4", "e5", "Nf3"]), Some(Color::White))
            .unwrap();

        assert_eq!(report.moves.len(), 3);
        assert!(report.moves.iter().all(|r| r.quality.is_none()));
        assert!(report.moves.iter().all(|r| r.eval_before_cp.is_none()));
        // Legal moves still resolve and the positions are tracked.
        assert_eq!(report.moves[0].move_uci.as_deref(), Some("e2e4"));
        assert!(report.moves[2].fen_after.is_some());
        assert!(report
            .errors
            .iter()
            .any(|e| e.kind == PlyErrorKind::EngineUnavailable));
    }

    #[test]
    fn invalid_move_truncates_but_returns_every_ply() {
        let mut analyzer = degraded_analyzer();
        let report = analyzer
            .analyze_game(&moves(&["e4", "Qxh8", "Nf3", "Nc6"]), None)
            .unwrap();

        assert_eq!(report.moves.len(), 4);
        assert_eq!(report.moves[0].move_uci.as_deref(), Some("e2e4"));
        // The broken ply and everything after it are null records.
        assert!(report.moves[1].move_uci.is_none());
        assert!(report.moves[2].move_uci.is_none());
        assert!(report.moves[3].fen_before.is_none());
        assert_eq!(report.moves[1].color, Color::Black);
        assert_eq!(report.moves[2].color, Color::White);
        assert!(report
            .errors
            .iter()
            .any(|e| e.kind == PlyErrorKind::InvalidMove && e.ply == 2));
    }

    #[test]
    fn records_are_in_ply_order() {
        let mut analyzer = degraded_analyzer();
        let report = analyzer
            .analyze_game(&moves(&["d4", "d5", "c4", "e6"]), None)
            .unwrap();
        let plies: Vec<usize> = report.moves.iter().map(|r| r.ply).collect();
        assert_eq!(plies, vec![1, 2, 3, 4]);
        assert_eq!(report.moves[0].color, Color::White);
        assert_eq!(report.moves[1].color, Color::Black);
    }

    #[test]
    fn empty_game_reports_perfect_accuracy() {
        let mut analyzer = degraded_analyzer();
        let report = analyzer.analyze_game(&[], None).unwrap();
        assert!(report.moves.is_empty());
        assert_eq!(report.white_stats.accuracy_percent, 100.0);
        assert_eq!(report.black_stats.accuracy_percent, 100.0);
    }

    #[test]
    fn invalid_start_position_is_a_hard_failure() {
        let mut analyzer = degraded_analyzer();
        let result = analyzer.analyze_game_from("not a fen", &moves(&["e4"]), None);
        assert!(matches!(result, Err(AnalyzerError::InvalidGame(_))));
    }

    #[test]
    fn gated_moves_are_excluded_from_game_accuracy() {
        // A decided-position move carries an accuracy but no label; only
        // the labeled move may count toward the aggregate.
        let mut gated = null_record(1, "a4", Color::White);
        gated.accuracy = Some(30.0);
        gated.win_prob_after = Some(95.0);
        let mut labeled = null_record(3, "Nf3", Color::White);
        labeled.accuracy = Some(90.0);
        labeled.quality = Some(MoveQuality::Good);
        labeled.win_prob_after = Some(95.0);

        let analyzer = degraded_analyzer();
        let report =
            analyzer.build_report(vec![gated, labeled], Vec::new(), Vec::new(), Vec::new());
        assert!((report.white_stats.accuracy_percent - 90.0).abs() < 1e-9);
    }

    #[test]
    fn report_round_trips_through_json() {
        let mut analyzer = degraded_analyzer();
        let report = analyzer.analyze_game(&moves(&["e4", "e5"]), None).unwrap();

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"white\""));
        assert!(json.contains("\"engine_unavailable\""));

        let parsed: GameReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.moves.len(), 2);
        assert_eq!(parsed.moves[0].move_uci.as_deref(), Some("e2e4"));
        assert_eq!(parsed.errors.len(), report.errors.len());
    }

    #[test]
    fn player_stats_count_labels() {
        let mut record = null_record(1, "e4", Color::White);
        record.quality = Some(MoveQuality::Best);
        record.centipawn_loss = Some(0);
        let mut second = null_record(3, "Nf3", Color::White);
        second.quality = Some(MoveQuality::Blunder);
        second.centipawn_loss = Some(400);

        let records = vec![record, second];
        let stats = PlayerStats::from_records(records.iter(), 55.0);
        assert_eq!(stats.classified_moves, 2);
        assert_eq!(stats.best_moves, 1);
        assert_eq!(stats.blunders, 1);
        assert!((stats.avg_cp_loss - 200.0).abs() < 1e-9);
        assert_eq!(stats.accuracy_percent, 55.0);
    }
}
