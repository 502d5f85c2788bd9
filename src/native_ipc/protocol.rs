use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation identifier carried by every message on the upstream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "debug:version")]
    Version,
    #[serde(rename = "action:colors")]
    Colors,
    #[serde(rename = "css:enable")]
    CssEnable,
    #[serde(rename = "css:disable")]
    CssDisable,
    #[serde(rename = "css:font:size")]
    CssFontSize,
    #[serde(rename = "theme:mode")]
    ThemeMode,
    #[serde(rename = "debug:output")]
    Output,
    #[serde(rename = "action:invalid")]
    InvalidAction,
}

impl Action {
    pub const ALL: [Self; 8] = [
        Self::Version,
        Self::Colors,
        Self::CssEnable,
        Self::CssDisable,
        Self::CssFontSize,
        Self::ThemeMode,
        Self::Output,
        Self::InvalidAction,
    ];

    /// Stable wire value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Version => "debug:version",
            Self::Colors => "action:colors",
            Self::CssEnable => "css:enable",
            Self::CssDisable => "css:disable",
            Self::CssFontSize => "css:font:size",
            Self::ThemeMode => "theme:mode",
            Self::Output => "debug:output",
            Self::InvalidAction => "action:invalid",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn default_success() -> bool {
    true
}

/// Message sent from the host to the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub action: Action,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl Message {
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            data: None,
            success: true,
            message: None,
        }
    }

    /// Attach a payload. `null` is stored as no payload so that the value
    /// survives a trip over the wire unchanged.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = match data.into() {
            Value::Null => None,
            value => Some(value),
        };
        self
    }

    /// Mark the message as failed with an explanation for the user.
    #[must_use]
    pub fn failure(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.message = Some(message.into());
        self
    }

    /// Carry a collaborator's result through unchanged.
    #[must_use]
    pub fn with_outcome(mut self, success: bool, message: Option<String>) -> Self {
        self.success = success;
        self.message = message;
        self
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::new(Action::InvalidAction).failure(reason)
    }
}

/// Request sent from the extension to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl Request {
    /// The requested target, if one was given and is non-empty.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref().filter(|target| !target.is_empty())
    }
}

#[cfg(test)]
impl Request {
    pub fn new(action: Action) -> Self {
        Self {
            action: action.as_str().to_string(),
            target: None,
            size: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }
}

/// A decoded upstream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Request(Request),
    /// The frame was complete but its body is not a request. Carries the
    /// parse error for logging.
    Malformed(String),
}

impl Inbound {
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice::<Request>(body) {
            Ok(request) => Self::Request(request),
            Err(e) => Self::Malformed(e.to_string()),
        }
    }
}
