use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::core::protocol::ToolSchema;

/// Instruction builder for a mode.
pub type InstructionsFn<C> = Arc<dyn Fn(&C) -> String + Send + Sync>;

/// Tool set builder for a mode.
pub type ToolsFn<C> = Arc<dyn Fn(&C) -> Vec<ToolSchema> + Send + Sync>;

/// A named bundle of instructions and tools, resolved against a fresh context.
pub struct Mode<C> {
    id: String,
    instructions: InstructionsFn<C>,
    tools: ToolsFn<C>,
}

impl<C> Mode<C> {
    pub fn new<I, T>(id: impl Into<String>, instructions: I, tools: T) -> Self
    where
        I: Fn(&C) -> String + Send + Sync + 'static,
        T: Fn(&C) -> Vec<ToolSchema> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            instructions: Arc::new(instructions),
            tools: Arc::new(tools),
        }
    }

    /// Mode whose instructions and tools do not depend on context.
    pub fn fixed(
        id: impl Into<String>,
        instructions: impl Into<String>,
        tools: Vec<ToolSchema>,
    ) -> Self
    where
        C: 'static,
    {
        let instructions = instructions.into();
        Self::new(id, move |_| instructions.clone(), move |_| tools.clone())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resolve(&self, ctx: &C) -> ResolvedMode {
        ResolvedMode {
            id: self.id.clone(),
            instructions: (self.instructions)(ctx),
            tools: (self.tools)(ctx),
        }
    }
}

impl<C> Clone for Mode<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            instructions: self.instructions.clone(),
            tools: self.tools.clone(),
        }
    }
}

impl<C> fmt::Debug for Mode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mode").field("id", &self.id).finish()
    }
}

/// Instructions and tools of a mode for one context.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMode {
    pub id: String,
    pub instructions: String,
    pub tools: Vec<ToolSchema>,
}

impl ResolvedMode {
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }
}

/// Immutable set of modes keyed by id.
pub struct ModeRegistry<C> {
    modes: HashMap<String, Mode<C>>,
}

impl<C> ModeRegistry<C> {
    pub fn new() -> Self {
        Self {
            modes: HashMap::new(),
        }
    }

    /// Add a mode, replacing any mode with the same id.
    pub fn with_mode(mut self, mode: Mode<C>) -> Self {
        self.modes.insert(mode.id.clone(), mode);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Mode<C>> {
        self.modes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    /// Resolve `id`, falling back to `fallback` when `id` is not registered.
    pub fn resolve_or(&self, id: &str, fallback: &str, ctx: &C) -> ResolvedMode {
        if let Some(mode) = self.get(id) {
            return mode.resolve(ctx);
        }

        error!(mode = %id, fallback = %fallback, "Unknown mode, using initial mode");
        match self.get(fallback) {
            Some(mode) => mode.resolve(ctx),
            None => ResolvedMode {
                id: fallback.to_string(),
                instructions: String::new(),
                tools: Vec::new(),
            },
        }
    }
}

impl<C> Default for ModeRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> FromIterator<Mode<C>> for ModeRegistry<C> {
    fn from_iter<I: IntoIterator<Item = Mode<C>>>(iter: I) -> Self {
        Self {
            modes: iter.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }
}
