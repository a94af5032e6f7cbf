// Status, stage and failure details

use serde::{Deserialize, Deserializer, Serialize};

/// Outcome of a test, fixture or step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Failed,
    Broken,
    Passed,
    Skipped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Failed => "failed",
            Status::Broken => "broken",
            Status::Passed => "passed",
            Status::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failed" => Ok(Self::Failed),
            "broken" => Ok(Self::Broken),
            "passed" => Ok(Self::Passed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Execution stage of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Scheduled,
    Running,
    Finished,
    Pending,
    Interrupted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scheduled => "scheduled",
            Stage::Running => "running",
            Stage::Finished => "finished",
            Stage::Pending => "pending",
            Stage::Interrupted => "interrupted",
        }
    }

    /// Case-insensitive lookup; unknown values yield `None`
    pub fn from_value(value: &str) -> Option<Self> {
        [
            Stage::Scheduled,
            Stage::Running,
            Stage::Finished,
            Stage::Pending,
            Stage::Interrupted,
        ]
        .into_iter()
        .find(|stage| stage.as_str().eq_ignore_ascii_case(value))
    }
}

/// Lenient stage deserializer used by every result type.
///
/// Result files written by other Allure integrations are not always
/// consistent about casing, and an unrecognized stage must not make the
/// whole file unreadable.
pub(crate) fn deserialize_stage<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(Stage::from_value))
}

/// Additional information attached to a non-passed status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default)]
    pub known: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub flaky: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl StatusDetails {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn with_flaky(mut self, flaky: bool) -> Self {
        self.flaky = flaky;
        self
    }

    pub fn with_known(mut self, known: bool) -> Self {
        self.known = known;
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Broken).unwrap();
        assert_eq!(json, "\"broken\"");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("PASSED".parse::<Status>(), Ok(Status::Passed));
        assert!("green".parse::<Status>().is_err());
    }

    #[test]
    fn test_stage_lookup_is_case_insensitive() {
        assert_eq!(Stage::from_value("FINISHED"), Some(Stage::Finished));
        assert_eq!(Stage::from_value("Running"), Some(Stage::Running));
        assert_eq!(Stage::from_value("done"), None);
    }

    #[test]
    fn test_status_details_skip_empty_message() {
        let details = StatusDetails::default().with_flaky(true);
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["flaky"], true);
        assert!(value.get("message").is_none());
        assert!(value.get("trace").is_none());
    }
}
