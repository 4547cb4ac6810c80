use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use uuid::Uuid;

/// Command text that terminates the session instead of running in the shell.
pub const QUIT_COMMAND: &str = "quit";

/// Sender-generated id correlating a command with its completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(pub String);

impl CommandId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh v4 id for an outgoing command.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One framed client -> server message, decoded exactly once at the
/// transport boundary.
///
/// Wire shapes are the legacy JSON objects:
/// `{"command": "...", "command_id": "..."}`, `{"input": "..."}` and
/// `{"command": "quit"}`. A `command` field equal to [`QUIT_COMMAND`] decodes
/// as [`Directive::Quit`] even if a stray `command_id` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Run `command` in the session shell; output is correlated through the
    /// completion marker derived from `command_id`.
    RunCommand {
        command: String,
        command_id: CommandId,
    },
    /// Text written straight into the shell's stdin, answering a prompt of
    /// the command currently running.
    ProvideInput { input: String },
    /// Close the session and shut the server down.
    Quit,
}

impl Directive {
    pub fn run_command(command: impl Into<String>, command_id: CommandId) -> Self {
        Self::RunCommand {
            command: command.into(),
            command_id,
        }
    }

    pub fn provide_input(input: impl Into<String>) -> Self {
        Self::ProvideInput {
            input: input.into(),
        }
    }
}

impl Serialize for Directive {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Directive::RunCommand {
                command,
                command_id,
            } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("command", command)?;
                map.serialize_entry("command_id", command_id)?;
                map.end()
            }
            Directive::ProvideInput { input } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("input", input)?;
                map.end()
            }
            Directive::Quit => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("command", QUIT_COMMAND)?;
                map.end()
            }
        }
    }
}

/// Loose wire shape; the fields the peer actually sent decide the variant.
#[derive(Deserialize)]
struct RawDirective {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    command_id: Option<String>,
    #[serde(default)]
    input: Option<String>,
}

impl<'de> Deserialize<'de> for Directive {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawDirective::deserialize(deserializer)?;
        if let Some(command) = raw.command {
            if command == QUIT_COMMAND {
                return Ok(Directive::Quit);
            }
            let command_id = raw
                .command_id
                .ok_or_else(|| D::Error::missing_field("command_id"))?;
            return Ok(Directive::RunCommand {
                command,
                command_id: CommandId(command_id),
            });
        }
        if let Some(input) = raw.input {
            return Ok(Directive::ProvideInput { input });
        }
        Err(D::Error::custom(
            "directive carries neither a command nor an input field",
        ))
    }
}
