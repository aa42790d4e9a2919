//! Pure derivations of display strings from a [`ProcessingState`].
//!
//! Everything here is a function of its arguments so the formats can be
//! pinned down by plain unit tests.

use super::{ProcessingState, ProcessingStatus};
use crate::config::DisplayConfig;

/// Message shown before details render (no state yet, or not generating).
const IDLE_MESSAGE: &str = "Processing 0% (ETA: \u{2014}s)";

/// Estimates seconds remaining for prompt processing.
///
/// Given that `progress_percent` of the work took `elapsed_ms`, the total
/// is `elapsed / (percent/100)` and the ETA is the difference. Returns
/// `None` when the inputs make no estimate possible (no progress yet,
/// already done, or no elapsed time recorded).
pub fn estimate_eta_secs(progress_percent: f64, elapsed_ms: f64) -> Option<f64> {
    if progress_percent <= 0.0 || progress_percent >= 100.0 || elapsed_ms <= 0.0 {
        return None;
    }
    let elapsed = elapsed_ms / 1000.0;
    let fraction = progress_percent / 100.0;
    let eta = elapsed / fraction - elapsed;
    (eta > 0.0).then_some(eta)
}

/// One-line status message for the current processing state.
pub fn processing_message(state: Option<&ProcessingState>) -> String {
    let Some(state) = state else {
        return IDLE_MESSAGE.to_string();
    };
    match state.status {
        ProcessingStatus::Preparing => {
            let percent = state.progress_percent.unwrap_or(0.0);
            let eta = estimate_eta_secs(percent, state.prompt_progress_time_ms);
            let eta_str = match eta {
                Some(secs) if secs > 0.0 => format!("{}s", secs.round() as i64),
                _ => "\u{2014}s".to_string(),
            };
            format!("Processing {percent}% (ETA: {eta_str})")
        }
        ProcessingStatus::Generating => {
            if state.tokens_decoded > 0 {
                format!("Generating... ({} tokens)", state.tokens_decoded)
            } else {
                "Generating...".to_string()
            }
        }
        ProcessingStatus::Initializing | ProcessingStatus::Idle => IDLE_MESSAGE.to_string(),
    }
}

/// Detail lines for the stats strip, in display order.
///
/// Prompt-side stats during `preparing`, generation stats during
/// `generating`, then context usage, output usage, and the speculative
/// indicator whenever the underlying data is present.
pub fn processing_details(state: &ProcessingState, display: &DisplayConfig) -> Vec<String> {
    let mut details = Vec::new();

    if state.status == ProcessingStatus::Preparing {
        if state.prompt_tokens > 0 {
            details.push(format!("{} tokens", state.prompt_tokens));
        }
        if state.prompt_progress_time_ms > 0.0 {
            details.push(format!("{:.2}s", state.prompt_progress_time_ms / 1000.0));
        }
        if state.prompt_tokens_per_second > 0.0 {
            details.push(format!("{:.2} tokens/s", state.prompt_tokens_per_second));
        }
    }

    if state.status == ProcessingStatus::Generating {
        if state.tokens_decoded > 0 {
            details.push(format!("{} tokens", state.tokens_decoded));
        }
        // Prefer the explicit generation time; derive from throughput
        // when the server does not report one.
        let elapsed_secs = if state.generation_time_ms > 0.0 {
            Some(state.generation_time_ms / 1000.0)
        } else if state.tokens_decoded > 0 && state.tokens_per_second > 0.0 {
            Some(state.tokens_decoded as f64 / state.tokens_per_second)
        } else {
            None
        };
        if let Some(secs) = elapsed_secs {
            details.push(format!("{secs:.2}s"));
        }
        if display.show_tokens_per_second && state.tokens_per_second > 0.0 {
            details.push(format!("{:.2} tokens/s", state.tokens_per_second));
        }
    }

    if state.context_total > 0 {
        let percent =
            ((state.context_used as f64 / state.context_total as f64) * 100.0).round() as i64;
        details.push(format!(
            "Context: {}/{} ({percent}%)",
            state.context_used, state.context_total
        ));
    }

    if state.output_tokens_used > 0 {
        if state.output_tokens_max <= 0 {
            // max_tokens of -1 signals an unlimited budget.
            details.push(format!("Output: {}/\u{221E}", state.output_tokens_used));
        } else {
            let percent = ((state.output_tokens_used as f64 / state.output_tokens_max as f64)
                * 100.0)
                .round() as i64;
            details.push(format!(
                "Output: {}/{} ({percent}%)",
                state.output_tokens_used, state.output_tokens_max
            ));
        }
    }

    if state.speculative {
        details.push("Speculative decoding enabled".to_string());
    }

    details
}

/// Whether the stats strip should render at all.
pub fn should_show_details(state: Option<&ProcessingState>) -> bool {
    state.is_some_and(|s| s.status != ProcessingStatus::Idle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generating_state() -> ProcessingState {
        ProcessingState {
            status: ProcessingStatus::Generating,
            tokens_decoded: 42,
            tokens_per_second: 21.0,
            context_used: 1000,
            context_total: 4096,
            ..ProcessingState::default()
        }
    }

    #[test]
    fn eta_half_done_after_ten_seconds() {
        assert_eq!(estimate_eta_secs(50.0, 10_000.0), Some(10.0));
    }

    #[test]
    fn eta_unavailable_at_bounds() {
        assert_eq!(estimate_eta_secs(0.0, 10_000.0), None);
        assert_eq!(estimate_eta_secs(100.0, 10_000.0), None);
        assert_eq!(estimate_eta_secs(50.0, 0.0), None);
    }

    #[test]
    fn message_without_state() {
        assert_eq!(processing_message(None), "Processing 0% (ETA: \u{2014}s)");
    }

    #[test]
    fn message_while_preparing() {
        let state = ProcessingState {
            status: ProcessingStatus::Preparing,
            progress_percent: Some(50.0),
            prompt_progress_time_ms: 10_000.0,
            ..ProcessingState::default()
        };
        assert_eq!(processing_message(Some(&state)), "Processing 50% (ETA: 10s)");
    }

    #[test]
    fn message_while_preparing_without_progress() {
        let state = ProcessingState {
            status: ProcessingStatus::Preparing,
            ..ProcessingState::default()
        };
        assert_eq!(
            processing_message(Some(&state)),
            "Processing 0% (ETA: \u{2014}s)"
        );
    }

    #[test]
    fn message_while_generating() {
        assert_eq!(
            processing_message(Some(&generating_state())),
            "Generating... (42 tokens)"
        );
        let mut quiet = generating_state();
        quiet.tokens_decoded = 0;
        assert_eq!(processing_message(Some(&quiet)), "Generating...");
    }

    #[test]
    fn context_line_rounds_to_integer_percent() {
        let details = processing_details(&generating_state(), &DisplayConfig::default());
        assert!(details.contains(&"Context: 1000/4096 (24%)".to_string()));
    }

    #[test]
    fn generation_details_order_and_derived_elapsed() {
        // No explicit generation time: elapsed derives from 42 tokens at
        // 21 tokens/s.
        let details = processing_details(&generating_state(), &DisplayConfig::default());
        assert_eq!(
            details,
            vec![
                "42 tokens",
                "2.00s",
                "21.00 tokens/s",
                "Context: 1000/4096 (24%)",
            ]
        );
    }

    #[test]
    fn tokens_per_second_respects_display_config() {
        let display = DisplayConfig {
            show_tokens_per_second: false,
            keep_stats_visible: false,
        };
        let details = processing_details(&generating_state(), &display);
        assert!(!details.iter().any(|d| d.ends_with("tokens/s")));
    }

    #[test]
    fn preparing_details_order() {
        let state = ProcessingState {
            status: ProcessingStatus::Preparing,
            prompt_tokens: 512,
            prompt_progress_time_ms: 1_234.0,
            prompt_tokens_per_second: 415.0,
            ..ProcessingState::default()
        };
        let details = processing_details(&state, &DisplayConfig::default());
        assert_eq!(details, vec!["512 tokens", "1.23s", "415.00 tokens/s"]);
    }

    #[test]
    fn unlimited_output_budget_renders_infinity() {
        let state = ProcessingState {
            status: ProcessingStatus::Generating,
            output_tokens_used: 128,
            output_tokens_max: -1,
            ..ProcessingState::default()
        };
        let details = processing_details(&state, &DisplayConfig::default());
        assert!(details.contains(&"Output: 128/\u{221E}".to_string()));
    }

    #[test]
    fn speculative_indicator_appended_last() {
        let mut state = generating_state();
        state.speculative = true;
        let details = processing_details(&state, &DisplayConfig::default());
        assert_eq!(details.last().unwrap(), "Speculative decoding enabled");
    }

    #[test]
    fn details_hidden_when_idle_or_absent() {
        assert!(!should_show_details(None));
        let idle = ProcessingState {
            status: ProcessingStatus::Idle,
            ..ProcessingState::default()
        };
        assert!(!should_show_details(Some(&idle)));
        assert!(should_show_details(Some(&generating_state())));
    }
}
