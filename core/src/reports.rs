use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// The agent's verdict on one executed command. `success` is `None` when the
/// output did not let the agent judge either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReport {
    pub command: String,
    #[serde(deserialize_with = "nullable")]
    pub success: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub insights: Option<String>,
}

/// `null` stays accepted but the field itself must be present; a derived
/// `Option` field would silently default to `None` when absent.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::deserialize(deserializer)
}

impl CommandReport {
    /// Parse a report from the JSON the agent answers with. All three fields
    /// must be present; `success` and `insights` may be `null`.
    pub fn from_json(message: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(message)
    }

    /// Canonical example payload, embedded in agent instructions so replies
    /// come back in the right shape.
    pub fn example_json() -> String {
        let example = Self {
            command: "git clone https://github.com/Nodestream/nodestream.git".to_string(),
            success: Some(true),
            insights: Some(
                "The cloning process completed successfully with all objects received and deltas resolved."
                    .to_string(),
            ),
        };
        serde_json::to_string(&example).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalReport {
    pub goal_name: String,
    pub goal_description: String,
    pub command_reports: Vec<CommandReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub file: String,
    pub goal_reports: Vec<GoalReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project: String,
    pub file_reports: Vec<DocumentReport>,
}
