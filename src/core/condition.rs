//! Boolean conditions evaluated by branch steps

use crate::core::{
    error::PipelineError,
    markup::{is_truthy_str, Markup},
};
use serde_json::Value;

/// A pre-compiled, boolean-valued markup template
///
/// Sources may be written either as a bare expression (`object.state == "draft"`)
/// or as markup (`{{ object.state == "draft" }}`).
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    markup: Markup,
}

impl Condition {
    pub fn compile(source: &str) -> Result<Self, PipelineError> {
        let trimmed = source.trim();
        let markup = if trimmed.contains("{{") {
            Markup::compile(trimmed)?
        } else {
            Markup::compile(&format!("{{{{ {} }}}}", trimmed))?
        };
        Ok(Self { markup })
    }

    pub fn source(&self) -> &str {
        self.markup.source()
    }

    /// Render against `data` and interpret the output as a boolean
    pub fn evaluate(&self, data: &Value) -> bool {
        is_truthy_str(&self.markup.render_plain(data))
    }
}
