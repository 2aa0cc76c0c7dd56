//! Profiled-session overlay applied strictly after scoring.
//!
//! A gap inside a profiled usage session is the inverted signal: someone was
//! authorized to drive, so silence is suspicious rather than benign. The
//! overlay subtracts a configured malus for covered gaps and adds a small
//! bonus for clear ones. It never touches the five base signals.

#![allow(missing_docs)]

use crate::core::config::ConfidenceConfig;
use crate::engine::scorer::GapAnalysis;
use crate::sources::ProfiledSession;

/// Apply the session overlay to every scored gap in place.
pub fn apply_session_overlay(
    analyses: &mut [GapAnalysis],
    sessions: &[ProfiledSession],
    config: &ConfidenceConfig,
) {
    for analysis in analyses {
        let covering = sessions.iter().find(|s| s.covers(analysis.timestamp));
        match covering {
            Some(session) => {
                analysis.confidence = (analysis.confidence - config.profiled_malus).max(0.0);
                analysis.was_profiled_during_gap = true;
                analysis.profiled_subject = Some(session.subject.clone());
                analysis.profiled_session_start = Some(session.started_at);
                analysis.profiled_session_end = session.expires_at;
                analysis.justification.push_str(
                    "; profiled usage session was active during this gap (suspicious absence)",
                );
            }
            None => {
                analysis.confidence =
                    (analysis.confidence + config.clear_session_bonus).min(100.0);
                analysis.justification
                    .push_str("; no profiled usage session overlaps this gap");
            }
        }
    }
}
