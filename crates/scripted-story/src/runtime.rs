//! Scripted playback runtime

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use story_mcp_core::{
    Choice, CompileResult, ContinueResult, Result, StoryMcpError, StoryRuntime,
    StoryRuntimeFactory,
};
use tracing::debug;

use crate::parser::{self, Node, Program, END_LABEL};

/// A playback cursor over a parsed script
pub struct ScriptedStory {
    program: Arc<Program>,
    pos: usize,
    vars: HashMap<String, Value>,
}

/// Opaque serialized state blob
#[derive(Serialize, Deserialize)]
struct StateBlob {
    pos: usize,
    vars: HashMap<String, Value>,
}

impl ScriptedStory {
    pub fn new(program: Program) -> Self {
        let vars = program.vars.clone();
        Self {
            program: Arc::new(program),
            pos: 0,
            vars,
        }
    }

    /// Follow diverts from `pos` to the next concrete node
    fn resolve(&self, mut pos: usize) -> usize {
        let nodes = &self.program.nodes;
        let mut hops = 0;
        while let Some(Node::Divert(target)) = nodes.get(pos) {
            // Divert cycles with no line in between cannot make progress
            hops += 1;
            if hops > nodes.len() {
                return nodes.len();
            }
            pos = if target == END_LABEL {
                nodes.len()
            } else {
                *self.program.labels.get(target).unwrap_or(&nodes.len())
            };
        }
        pos
    }

    fn choices_at(&self, pos: usize) -> Vec<Choice> {
        match self.program.nodes.get(pos) {
            Some(Node::Choices(defs)) => defs
                .iter()
                .enumerate()
                .map(|(index, def)| Choice {
                    index,
                    text: def.text.clone(),
                    tags: def.tags.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn snapshot(&self) -> ContinueResult {
        let pos = self.resolve(self.pos);
        ContinueResult::snapshot(
            matches!(self.program.nodes.get(pos), Some(Node::Line { .. })),
            self.choices_at(pos),
        )
    }
}

#[async_trait]
impl StoryRuntime for ScriptedStory {
    fn can_continue(&self) -> bool {
        let pos = self.resolve(self.pos);
        matches!(self.program.nodes.get(pos), Some(Node::Line { .. }))
    }

    async fn continue_story(&mut self) -> Result<ContinueResult> {
        let pos = self.resolve(self.pos);
        let Some(Node::Line {
            text,
            tags,
            assigns,
        }) = self.program.nodes.get(pos)
        else {
            let pending = self.choices_at(pos).len();
            return Err(StoryMcpError::StoryEnded(format!(
                "{pending} choices pending"
            )));
        };

        for (name, value) in assigns {
            self.vars.insert(name.clone(), value.clone());
        }
        self.pos = pos + 1;

        let next = self.resolve(self.pos);
        Ok(ContinueResult {
            text: text.clone(),
            can_continue: matches!(self.program.nodes.get(next), Some(Node::Line { .. })),
            choices: self.choices_at(next),
            tags: tags.clone(),
        })
    }

    fn current_choices(&self) -> Vec<Choice> {
        self.choices_at(self.resolve(self.pos))
    }

    async fn choose(&mut self, index: usize) -> Result<ContinueResult> {
        let pos = self.resolve(self.pos);
        let Some(Node::Choices(defs)) = self.program.nodes.get(pos) else {
            return Err(StoryMcpError::InvalidChoice {
                index,
                available: 0,
            });
        };
        let Some(def) = defs.get(index) else {
            return Err(StoryMcpError::InvalidChoice {
                index,
                available: defs.len(),
            });
        };

        debug!(index, text = %def.text, "Choice taken");
        self.pos = match &def.target {
            Some(target) if target == END_LABEL => self.program.nodes.len(),
            Some(target) => *self
                .program
                .labels
                .get(target)
                .unwrap_or(&self.program.nodes.len()),
            None => pos + 1,
        };

        if self.can_continue() {
            self.continue_story().await
        } else {
            Ok(self.snapshot())
        }
    }

    async fn get_variable(&self, name: &str) -> Result<Value> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| StoryMcpError::VariableNotFound(name.to_string()))
    }

    async fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    async fn evaluate_function(&mut self, name: &str, _args: &[Value]) -> Result<Value> {
        self.program
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| StoryMcpError::Runtime(format!("Unknown function: {name}")))
    }

    async fn save_state(&self) -> Result<String> {
        let blob = StateBlob {
            pos: self.pos,
            vars: self.vars.clone(),
        };
        Ok(serde_json::to_string(&blob)?)
    }

    async fn load_state(&mut self, json: &str) -> Result<()> {
        let blob: StateBlob = serde_json::from_str(json)?;
        self.pos = blob.pos;
        self.vars = blob.vars;
        Ok(())
    }

    fn global_tags(&self) -> Vec<String> {
        self.program.global_tags.clone()
    }

    async fn shutdown(&mut self) -> Result<()> {
        // No external execution context to release
        Ok(())
    }
}

/// Factory producing isolated [`ScriptedStory`] instances
#[derive(Default)]
pub struct ScriptedStoryFactory;

impl ScriptedStoryFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoryRuntimeFactory for ScriptedStoryFactory {
    async fn compile(&self, source: &str) -> Result<CompileResult> {
        Ok(parser::compile(source))
    }

    async fn create(&self, source: &str) -> Result<Box<dyn StoryRuntime>> {
        let program = parser::parse(source)?;
        Ok(Box::new(ScriptedStory::new(program)))
    }

    async fn restore(&self, source: &str, state_json: &str) -> Result<Box<dyn StoryRuntime>> {
        let program = parser::parse(source)?;
        let mut story = ScriptedStory::new(program);
        story.load_state(state_json).await?;
        Ok(Box::new(story))
    }
}
