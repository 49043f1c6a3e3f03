//! Flow definition edit pipeline.
//!
//! An [`FlowEditor`] is an ordered list of document changes applied to the
//! parsed flow definition before it is installed. Steps run strictly in
//! registration order and each sees the result of the previous one. The
//! first failing step aborts the pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use nifi_testbed::edit::FlowEditor;
//!
//! let editor = FlowEditor::builder()
//!     .set_single_processor_property("GetHTTP", "URL", "http://localhost:12345")?
//!     .set_class_of_single_processor("PutFile", "com.example.MockPutFile")?
//!     .build()?;
//! ```

pub mod document;

use std::fmt;
use std::path::Path;

use xmltree::Element;

use crate::error::{ConfigError, PipelineError};

/// A single mutation of the flow document.
///
/// Closures taking `&mut Element` and returning `anyhow::Result<()>` are
/// document changes.
pub trait DocumentChange: Send + Sync {
    fn edit(&self, document: &mut Element) -> anyhow::Result<()>;
}

impl<F> DocumentChange for F
where
    F: Fn(&mut Element) -> anyhow::Result<()> + Send + Sync,
{
    fn edit(&self, document: &mut Element) -> anyhow::Result<()> {
        self(document)
    }
}

struct Step {
    description: String,
    change: Box<dyn DocumentChange>,
}

/// Frozen, ordered list of flow document changes.
pub struct FlowEditor {
    steps: Vec<Step>,
}

impl FlowEditor {
    pub fn builder() -> FlowEditorBuilder {
        FlowEditorBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step to `document` in order.
    ///
    /// On failure the steps before the failing one have already been
    /// applied; callers discard the document.
    pub fn apply(&self, document: &mut Element) -> Result<(), PipelineError> {
        for (step, Step { description, change }) in self.steps.iter().enumerate() {
            tracing::debug!(step, %description, "applying flow edit");
            change.edit(document).map_err(|source| PipelineError {
                step,
                description: description.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Read `input`, apply the pipeline and write the result to `output`.
    pub fn edit_file(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        let mut doc = document::read_document(input)?;
        self.apply(&mut doc)?;
        document::write_document(&doc, output)
    }
}

impl fmt::Debug for FlowEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| &s.description))
            .finish()
    }
}

/// Single-use builder for [`FlowEditor`].
#[derive(Default)]
pub struct FlowEditorBuilder {
    consumed: bool,
    steps: Vec<Step>,
}

impl FlowEditorBuilder {
    fn ensure_unused(&self) -> Result<(), ConfigError> {
        if self.consumed {
            return Err(ConfigError::BuilderConsumed);
        }
        Ok(())
    }

    /// Append an arbitrary document change.
    pub fn raw_xml_change(
        &mut self,
        change: impl DocumentChange + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.push(format!("raw change #{}", self.steps.len()), change)
    }

    fn push(
        &mut self,
        description: String,
        change: impl DocumentChange + 'static,
    ) -> Result<&mut Self, ConfigError> {
        self.ensure_unused()?;
        self.steps.push(Step {
            description,
            change: Box::new(change),
        });
        Ok(self)
    }

    /// Overwrite the value of `property` on the processor named `processor`.
    pub fn set_single_processor_property(
        &mut self,
        processor: &str,
        property: &str,
        new_value: &str,
    ) -> Result<&mut Self, ConfigError> {
        let description = format!("set property '{property}' of '{processor}'");
        let (processor, property, new_value) =
            (processor.to_string(), property.to_string(), new_value.to_string());

        self.push(description, move |doc: &mut Element| -> anyhow::Result<()> {
            let element = document::single_processor_mut(doc, &processor)?;
            let value = document::property_value_mut(element, &processor, &property)?;
            document::set_text(value, &new_value);
            Ok(())
        })
    }

    /// Replace the implementation class of the processor named `processor`.
    pub fn set_class_of_single_processor(
        &mut self,
        processor: &str,
        class_name: &str,
    ) -> Result<&mut Self, ConfigError> {
        let description = format!("set class of '{processor}' to '{class_name}'");
        let (processor, class_name) = (processor.to_string(), class_name.to_string());

        self.push(description, move |doc: &mut Element| -> anyhow::Result<()> {
            let element = document::single_processor_mut(doc, &processor)?;
            let class = document::class_mut(element, &processor)?;
            document::set_text(class, &class_name);
            Ok(())
        })
    }

    /// Freeze the steps. The builder rejects every call afterwards.
    pub fn build(&mut self) -> Result<FlowEditor, ConfigError> {
        self.ensure_unused()?;
        self.consumed = true;
        Ok(FlowEditor {
            steps: std::mem::take(&mut self.steps),
        })
    }
}
