//! Reference backend context

use crate::{check_input, ExecutionContext, RunError};
use model_loader::{Accelerator, DenseHead, ModelHandle};
use std::sync::Arc;
use std::thread;
use tensor_core::{ImageGeometry, Tensor, TensorData};
use tracing::debug;

/// Working buffers, dropped on destroy
struct Buffers {
    /// One channel-sum accumulator per worker
    partials: Vec<Vec<f32>>,
    means: Vec<f32>,
    scores: Vec<f32>,
}

/// Runs a pooled dense head, splitting pooling rows across worker threads
pub struct ReferenceContext {
    handle: Arc<ModelHandle>,
    head: Arc<DenseHead>,
    buffers: Option<Buffers>,
}

impl ReferenceContext {
    pub fn new(handle: Arc<ModelHandle>, head: Arc<DenseHead>) -> Self {
        let channels = head.channels();
        let workers = handle
            .thread_count()
            .min(handle.input_geometry().height)
            .max(1);
        debug!(
            "Creating reference context for '{}' with {} worker(s)",
            handle.name(),
            workers
        );
        let buffers = Buffers {
            partials: vec![vec![0.0; channels]; workers],
            means: vec![0.0; channels],
            scores: vec![0.0; head.classes()],
        };
        Self {
            handle,
            head,
            buffers: Some(buffers),
        }
    }
}

impl ExecutionContext for ReferenceContext {
    fn run(&mut self, input: &Tensor) -> Result<Vec<Tensor>, RunError> {
        let buffers = self.buffers.as_mut().ok_or(RunError::Destroyed)?;
        check_input(&self.handle, input)?;

        let geometry = self.handle.input_geometry();
        match input.data() {
            TensorData::F32(values) => pool(values, &geometry, &mut buffers.partials)?,
            TensorData::U8(values) => pool(values, &geometry, &mut buffers.partials)?,
        }

        let area = (geometry.height * geometry.width) as f32;
        buffers.means.fill(0.0);
        for partial in &buffers.partials {
            for (m, &s) in buffers.means.iter_mut().zip(partial) {
                *m += s;
            }
        }
        for m in buffers.means.iter_mut() {
            *m /= area;
        }

        self.head.forward(&buffers.means, &mut buffers.scores);
        if buffers.scores.iter().any(|s| !s.is_finite()) {
            return Err(RunError::ExecutionFault(
                "Dense head produced non-finite scores".to_string(),
            ));
        }

        let output = self
            .handle
            .outputs()
            .first()
            .ok_or_else(|| RunError::ExecutionFault("Model declares no outputs".to_string()))?;
        let tensor = Tensor::from_f32(output.shape.clone(), buffers.scores.clone())
            .map_err(|e| RunError::ExecutionFault(e.to_string()))?;
        Ok(vec![tensor])
    }

    fn destroy(&mut self) {
        if self.buffers.take().is_some() {
            debug!("Destroyed reference context for '{}'", self.handle.name());
        }
    }

    fn is_destroyed(&self) -> bool {
        self.buffers.is_none()
    }

    fn thread_count(&self) -> usize {
        self.handle.thread_count()
    }

    fn accelerator(&self) -> Accelerator {
        self.handle.accelerator()
    }
}

impl Drop for ReferenceContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Sum every channel over the image, one row band per partial buffer
fn pool<T>(values: &[T], geometry: &ImageGeometry, partials: &mut [Vec<f32>]) -> Result<(), RunError>
where
    T: Copy + Into<f32> + Sync,
{
    let rows_per_worker = geometry.height.div_ceil(partials.len().max(1));

    if partials.len() == 1 {
        sum_rows(values, geometry, 0, geometry.height, &mut partials[0]);
        return Ok(());
    }

    thread::scope(|scope| {
        let workers: Vec<_> = partials
            .iter_mut()
            .enumerate()
            .map(|(i, partial)| {
                let y0 = (i * rows_per_worker).min(geometry.height);
                let y1 = (y0 + rows_per_worker).min(geometry.height);
                scope.spawn(move || sum_rows(values, geometry, y0, y1, partial))
            })
            .collect();

        for worker in workers {
            worker
                .join()
                .map_err(|_| RunError::ExecutionFault("Pooling worker panicked".to_string()))?;
        }
        Ok(())
    })
}

fn sum_rows<T>(values: &[T], geometry: &ImageGeometry, y0: usize, y1: usize, sums: &mut [f32])
where
    T: Copy + Into<f32>,
{
    sums.fill(0.0);
    for y in y0..y1 {
        for x in 0..geometry.width {
            for (c, sum) in sums.iter_mut().enumerate().take(geometry.channels) {
                *sum += values[geometry.index(y, x, c)].into();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextFactory, DefaultContextFactory};
    use model_loader::mock::classifier_handle;
    use model_loader::LoadOptions;
    use tensor_core::{DType, ErrorKind, Shape};

    fn context(threads: i64) -> Box<dyn ExecutionContext> {
        let handle =
            classifier_handle(6, 5, 3, 10, LoadOptions::with_threads(threads)).unwrap();
        DefaultContextFactory.create(&Arc::new(handle)).unwrap()
    }

    fn ramp() -> Tensor {
        let values = (0..6 * 5 * 3).map(|i| (i % 17) as f32 / 17.0).collect();
        Tensor::from_f32(Shape::new(vec![1, 6, 5, 3]), values).unwrap()
    }

    #[test]
    fn test_run_produces_probabilities() {
        let mut ctx = context(1);
        let outputs = ctx.run(&ramp()).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].shape().dims(), &[1, 10]);
        let scores = outputs[0].as_f32().unwrap();
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let single = context(1).run(&ramp()).unwrap();
        let multi = context(4).run(&ramp()).unwrap();
        let a = single[0].as_f32().unwrap();
        let b = multi[0].as_f32().unwrap();
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_shape_mismatch_keeps_context_usable() {
        let mut ctx = context(2);
        let wrong = Tensor::zeros(Shape::new(vec![1, 5, 6, 3]), DType::F32);
        assert_eq!(ctx.run(&wrong).unwrap_err().kind(), ErrorKind::ShapeMismatch);
        assert!(ctx.run(&ramp()).is_ok());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut ctx = context(1);
        ctx.destroy();
        ctx.destroy();
        assert!(ctx.is_destroyed());
        assert_eq!(ctx.run(&ramp()).unwrap_err().kind(), ErrorKind::InvalidState);
    }
}
