//! Blocked reports: a generation step's structured "I cannot proceed" signal.
//!
//! The model is told (see [`blocked_instruction`]) to emit
//!
//! ```text
//! <genuinely-blocked>
//! goal: ...
//! open_tasks: ...
//! obstacle: ...
//! reason: ...
//! </genuinely-blocked>
//! ```
//!
//! [`parse_blocked_from_text`] turns that block into a [`BlockedReport`]; the generation step then
//! classifies the call as blocked and appends the report to a [`BlockReportStore`].

mod store;

pub use store::{
    BlockReportStore, FileBlockReportStore, InMemoryBlockReportStore, ReportStoreError,
};

use std::fmt;
use std::str::FromStr;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Standard reasons an agent may report itself blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    MissingInput,
    PermissionDenied,
    AmbiguousGoal,
    ToolFailure,
    DependencyMissing,
    HumanRequired,
    Other,
}

impl BlockReason {
    pub const ALL: [BlockReason; 7] = [
        BlockReason::MissingInput,
        BlockReason::PermissionDenied,
        BlockReason::AmbiguousGoal,
        BlockReason::ToolFailure,
        BlockReason::DependencyMissing,
        BlockReason::HumanRequired,
        BlockReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::MissingInput => "missing_input",
            BlockReason::PermissionDenied => "permission_denied",
            BlockReason::AmbiguousGoal => "ambiguous_goal",
            BlockReason::ToolFailure => "tool_failure",
            BlockReason::DependencyMissing => "dependency_missing",
            BlockReason::HumanRequired => "human_required",
            BlockReason::Other => "other",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(|c: char| c == ' ' || c == '-', "_");
        BlockReason::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| format!("unknown block reason: {}", s))
    }
}

/// Report parsed from a `<genuinely-blocked>` block.
///
/// Field values are kept verbatim; a field missing from the block is an empty string.
/// `reason` stays free text so a report with a non-standard reason still round-trips;
/// use [`reason_kind`](Self::reason_kind) for the enumerated form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedReport {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub open_tasks: String,
    #[serde(default)]
    pub obstacle: String,
    #[serde(default)]
    pub reason: String,
    /// Inner text of the block as the model wrote it.
    #[serde(default, skip_serializing)]
    pub raw_text: String,
    #[serde(default)]
    pub timestamp: String,
    /// Where the store put this report, once appended.
    #[serde(default)]
    pub cached_path: Option<String>,
}

impl BlockedReport {
    /// Empty report stamped with the current local time.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            goal: String::new(),
            open_tasks: String::new(),
            obstacle: String::new(),
            reason: String::new(),
            raw_text: raw_text.into(),
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            cached_path: None,
        }
    }

    /// `reason` as one of the seven standard reasons, if it is one.
    pub fn reason_kind(&self) -> Option<BlockReason> {
        self.reason.parse().ok()
    }

    /// JSON form written by the file store: includes `"blocked": true`.
    pub fn to_json(&self) -> Value {
        json!({
            "blocked": true,
            "goal": self.goal,
            "open_tasks": self.open_tasks,
            "obstacle": self.obstacle,
            "reason": self.reason,
            "timestamp": self.timestamp,
            "cached_path": self.cached_path,
        })
    }
}

/// Instruction appended to every generation prompt describing the blocked-report format.
pub fn blocked_instruction() -> &'static str {
    r#"

## If You Cannot Proceed

If you encounter a genuine obstacle that prevents completing this task, report it using this EXACT format:

<genuinely-blocked>
goal: [the goal you were trying to accomplish]
open_tasks: [what remains to be done]
obstacle: [what specifically is blocking you]
reason: [why this is blocking - missing_input, permission_denied, ambiguous_goal, tool_failure, dependency_missing, human_required, or other]
</genuinely-blocked>

Only use this when truly blocked. Try to complete the task first. If blocked, report immediately without further attempts.
"#
}

/// Parses the first `<genuinely-blocked>` block in `text`, or `None` when there is none.
///
/// Each `key: value` line inside the block is matched by key (lowercased, spaces as `_`);
/// unknown keys are ignored.
pub fn parse_blocked_from_text(text: &str) -> Option<BlockedReport> {
    let re = RegexBuilder::new(r"<genuinely-blocked>\s*(.*?)\s*</genuinely-blocked>")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()?;
    let content = re.captures(text)?.get(1)?.as_str();

    let mut report = BlockedReport::new(content);
    for line in content.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase().replace(' ', "_");
        let value = value.trim().to_string();
        match key.as_str() {
            "goal" => report.goal = value,
            "open_tasks" => report.open_tasks = value,
            "obstacle" => report.obstacle = value,
            "reason" => report.reason = value,
            _ => {}
        }
    }
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCKED: &str = "I tried.\n<genuinely-blocked>\ngoal: Deploy the service\nopen_tasks: run migrations, restart\nobstacle: no database credentials\nreason: missing_input\n</genuinely-blocked>\n";

    /// **Scenario**: All four fields are parsed verbatim from the marker.
    #[test]
    fn parses_all_fields() {
        let report = parse_blocked_from_text(BLOCKED).expect("report");
        assert_eq!(report.goal, "Deploy the service");
        assert_eq!(report.open_tasks, "run migrations, restart");
        assert_eq!(report.obstacle, "no database credentials");
        assert_eq!(report.reason, "missing_input");
        assert_eq!(report.reason_kind(), Some(BlockReason::MissingInput));
        assert!(report.raw_text.starts_with("goal:"));
        assert!(!report.timestamp.is_empty());
    }

    /// **Scenario**: Text without the marker yields no report.
    #[test]
    fn no_marker_no_report() {
        assert!(parse_blocked_from_text("All done, here is the code.").is_none());
        assert!(parse_blocked_from_text("").is_none());
    }

    /// **Scenario**: Missing fields default to empty; keys are case-insensitive; values keep colons.
    #[test]
    fn partial_block_and_key_normalization() {
        let text = "<GENUINELY-BLOCKED>Obstacle: need url: https://x\nOpen Tasks: all</genuinely-blocked>";
        let report = parse_blocked_from_text(text).unwrap();
        assert_eq!(report.goal, "");
        assert_eq!(report.obstacle, "need url: https://x");
        assert_eq!(report.open_tasks, "all");
        assert_eq!(report.reason, "");
        assert_eq!(report.reason_kind(), None);
    }

    /// **Scenario**: The instruction describes the exact marker and all seven reasons.
    #[test]
    fn instruction_lists_marker_and_reasons() {
        let text = blocked_instruction();
        assert!(text.contains("<genuinely-blocked>"));
        for reason in BlockReason::ALL {
            assert!(text.contains(reason.as_str()), "missing {}", reason);
        }
        let parsed = parse_blocked_from_text(text).unwrap();
        assert!(parsed.goal.contains("the goal"));
    }

    #[test]
    fn to_json_marks_blocked() {
        let report = parse_blocked_from_text(BLOCKED).unwrap();
        let v = report.to_json();
        assert_eq!(v["blocked"], json!(true));
        assert_eq!(v["reason"], json!("missing_input"));
        assert_eq!(v["cached_path"], Value::Null);
    }

    #[test]
    fn block_reason_from_str_normalizes() {
        assert_eq!("Human Required".parse::<BlockReason>(), Ok(BlockReason::HumanRequired));
        assert_eq!("tool-failure".parse::<BlockReason>(), Ok(BlockReason::ToolFailure));
        assert!("bored".parse::<BlockReason>().is_err());
    }
}
