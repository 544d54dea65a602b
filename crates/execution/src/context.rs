//! Context trait and factory

use crate::{OnnxContext, ReferenceContext, RunError};
use model_loader::{Accelerator, CompiledGraph, ModelHandle};
use std::sync::Arc;
use tensor_core::Tensor;

/// Mutable runtime resource bound to one model handle
///
/// `run` takes `&mut self`, so a context can never execute two inputs at once.
pub trait ExecutionContext: Send {
    /// Execute the graph once, returning one tensor per declared output
    fn run(&mut self, input: &Tensor) -> Result<Vec<Tensor>, RunError>;

    /// Release buffers and accelerator resources; safe to call twice
    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;

    fn thread_count(&self) -> usize;

    fn accelerator(&self) -> Accelerator;
}

/// Creates execution contexts for loaded models
pub trait ContextFactory: Send + Sync {
    fn create(&self, handle: &Arc<ModelHandle>) -> Result<Box<dyn ExecutionContext>, RunError>;
}

/// Factory picking the context type matching the compiled graph
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContextFactory;

impl ContextFactory for DefaultContextFactory {
    fn create(&self, handle: &Arc<ModelHandle>) -> Result<Box<dyn ExecutionContext>, RunError> {
        match handle.graph() {
            CompiledGraph::Reference(head) => Ok(Box::new(ReferenceContext::new(
                Arc::clone(handle),
                Arc::clone(head),
            ))),
            CompiledGraph::Onnx(graph) => Ok(Box::new(OnnxContext::new(
                Arc::clone(handle),
                graph.clone(),
            ))),
        }
    }
}

/// Verify `input` against the handle's declared input tensor
pub fn check_input(handle: &ModelHandle, input: &Tensor) -> Result<(), RunError> {
    let declared = handle.input();
    if input.shape() != &declared.shape || input.dtype() != declared.dtype {
        return Err(RunError::ShapeMismatch {
            expected: format!("{} {}", declared.dtype, declared.shape),
            actual: format!("{} {}", input.dtype(), input.shape()),
        });
    }
    Ok(())
}
