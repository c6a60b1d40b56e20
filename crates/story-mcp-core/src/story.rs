//! Wire types for story continuation and compilation

use serde::{Deserialize, Serialize};

/// A pending choice presented by the story
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    /// Zero-based index used to select this choice
    pub index: usize,
    /// Choice text as shown to the player
    pub text: String,
    /// Tags attached to the choice
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of advancing the story by one continuation unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContinueResult {
    /// Output text produced by this continuation
    pub text: String,

    /// Whether the story can continue without a choice
    pub can_continue: bool,

    /// Choices currently on offer (empty while text is still flowing)
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Tags attached to the emitted text
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContinueResult {
    /// A result carrying no new output, reflecting the current story state.
    pub fn snapshot(can_continue: bool, choices: Vec<Choice>) -> Self {
        Self {
            text: String::new(),
            can_continue,
            choices,
            tags: Vec::new(),
        }
    }
}

/// Result of compiling story source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    /// Whether compilation succeeded
    pub success: bool,

    /// Compiled story JSON, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,

    /// Compilation errors
    #[serde(default)]
    pub errors: Vec<String>,

    /// Non-fatal warnings
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_result_wire_shape() {
        let result = ContinueResult {
            text: "The door creaks open.".into(),
            can_continue: true,
            choices: vec![Choice {
                index: 0,
                text: "Enter".into(),
                tags: vec!["brave".into()],
            }],
            tags: vec!["spooky".into()],
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["canContinue"], true);
        assert_eq!(value["choices"][0]["index"], 0);
        assert_eq!(value["choices"][0]["tags"][0], "brave");
        assert_eq!(value["tags"][0], "spooky");
    }

    #[test]
    fn continue_result_accepts_missing_lists() {
        let json = r#"{"text":"Hello.","canContinue":false}"#;
        let result: ContinueResult = serde_json::from_str(json).unwrap();
        assert!(result.choices.is_empty());
        assert!(result.tags.is_empty());
    }
}
