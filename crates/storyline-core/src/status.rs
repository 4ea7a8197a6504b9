//! Status normalization: any framework vocabulary to [`TestStatus`].

use crate::model::TestStatus;

/// Map a raw status token to the canonical four-state status.
///
/// Matching is case-insensitive. `todo` becomes `pending`; `timeout` and
/// `interrupted` become `failed`. Unknown or absent tokens become `skipped`,
/// so unrecognised work is never reported as passed.
pub fn normalize_status(raw: Option<&str>) -> TestStatus {
    let Some(token) = raw else {
        return TestStatus::Skipped;
    };
    match token.trim().to_ascii_lowercase().as_str() {
        "pass" | "passed" => TestStatus::Passed,
        "fail" | "failed" | "timeout" | "timedout" | "interrupted" => TestStatus::Failed,
        "todo" | "pending" => TestStatus::Pending,
        "skip" | "skipped" => TestStatus::Skipped,
        other => {
            tracing::debug!(status = %other, "unrecognised status, treating as skipped");
            TestStatus::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_open_vocabulary() {
        let cases = [
            ("pass", TestStatus::Passed),
            ("fail", TestStatus::Failed),
            ("skip", TestStatus::Skipped),
            ("todo", TestStatus::Pending),
            ("pending", TestStatus::Pending),
            ("timeout", TestStatus::Failed),
            ("interrupted", TestStatus::Failed),
            ("unknown", TestStatus::Skipped),
            ("PASSED", TestStatus::Passed),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_status(Some(raw)), expected, "raw = {raw}");
        }
    }

    #[test]
    fn absent_or_garbage_is_skipped() {
        assert_eq!(normalize_status(None), TestStatus::Skipped);
        assert_eq!(normalize_status(Some("")), TestStatus::Skipped);
        assert_eq!(normalize_status(Some("exploded")), TestStatus::Skipped);
    }
}
