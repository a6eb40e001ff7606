//! Scheduler output parsing

use sluice_core::SchedulerStatus;

/// Marker printed by the submission command on success
pub(crate) const SUBMIT_ACK: &str = "Submitted batch job";

/// Longest accounting line kept in an error detail
pub(crate) const MAX_DETAIL_CHARS: usize = 200;

/// Extracts the job id from a submission acknowledgment
///
/// The id is the last token of the line carrying the acknowledgment and must
/// be numeric.
pub(crate) fn parse_submission_ack(stdout: &str) -> Option<String> {
    let line = stdout.lines().find(|line| line.contains(SUBMIT_ACK))?;
    let token = line.split_whitespace().last()?;

    if token.chars().all(|c| c.is_ascii_digit()) {
        Some(token.to_string())
    } else {
        None
    }
}

/// Parses the state reported by a queue or accounting query
///
/// Only the first non-empty line is considered (accounting also lists the
/// job's steps below the job itself). `None` means the tool printed nothing.
pub(crate) fn parse_state_output(stdout: &str) -> Option<SchedulerStatus> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(SchedulerStatus::from_token)
}

/// First non-empty line, cut to `max` characters with a trailing ellipsis
pub(crate) fn first_line_truncated(text: &str, max: usize) -> Option<String> {
    let line = text.lines().map(str::trim).find(|line| !line.is_empty())?;

    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        Some(format!("{}...", cut))
    } else {
        Some(line.to_string())
    }
}

/// The first `count` non-empty lines joined by single spaces
pub(crate) fn head_lines_joined(text: &str, count: usize) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(count)
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}
