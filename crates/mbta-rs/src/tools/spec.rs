//! Structured tool descriptions with usage guidance.
//!
//! `ToolSpec` turns purpose, when-to-use and when-not-to-use guidance plus
//! examples into the single description string a tool-calling model reads.
//! The `when_not_to_use` line is what keeps models from mixing up the many
//! similar transit lookups.

use super::core::ToolDef;

/// A structured tool specification.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    /// One-sentence imperative purpose: "Get real-time predictions for a stop".
    pub purpose: String,
    pub when_to_use: String,
    /// Points at the better tool for neighbouring requests.
    pub when_not_to_use: String,
    pub parameters: serde_json::Value,
    /// (input, expected behaviour) pairs.
    pub examples: Vec<(String, String)>,
    pub output_format: String,
}

impl ToolSpec {
    pub fn builder(name: impl Into<String>, purpose: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            spec: ToolSpec {
                name: name.into(),
                purpose: purpose.into(),
                when_to_use: String::new(),
                when_not_to_use: String::new(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
                examples: Vec::new(),
                output_format: String::new(),
            },
        }
    }

    /// Render the description string. Empty sections are omitted.
    pub fn to_description(&self) -> String {
        let mut desc = format!("{}.", self.purpose.trim_end_matches('.'));
        if !self.when_to_use.is_empty() {
            desc.push_str(&format!("\nWhen to use: {}", self.when_to_use));
        }
        if !self.when_not_to_use.is_empty() {
            desc.push_str(&format!("\nWhen NOT to use: {}", self.when_not_to_use));
        }
        if !self.examples.is_empty() {
            desc.push_str("\nExamples:");
            for (input, output) in &self.examples {
                desc.push_str(&format!("\n  - {input} → {output}"));
            }
        }
        if !self.output_format.is_empty() {
            desc.push_str(&format!("\nOutput format: {}", self.output_format));
        }
        desc
    }

    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(self.name.clone(), self.to_description(), self.parameters.clone())
    }
}

pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    pub fn when_to_use(mut self, when: impl Into<String>) -> Self {
        self.spec.when_to_use = when.into();
        self
    }

    pub fn when_not_to_use(mut self, when_not: impl Into<String>) -> Self {
        self.spec.when_not_to_use = when_not.into();
        self
    }

    pub fn parameters(mut self, params: serde_json::Value) -> Self {
        self.spec.parameters = params;
        self
    }

    /// Derive the parameter schema from the argument type, so the published
    /// schema and deserialization cannot diverge.
    pub fn parameters_for<T: schemars::JsonSchema>(self) -> Self {
        self.parameters(crate::json_schema_for::<T>())
    }

    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.spec.examples.push((input.into(), output.into()));
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.spec.output_format = format.into();
        self
    }

    pub fn build(self) -> ToolSpec {
        self.spec
    }

    /// Shortcut for `.build().to_tool_def()`.
    pub fn to_tool_def(self) -> ToolDef {
        self.spec.to_tool_def()
    }
}
