//! ONNX backend context

use crate::{check_input, ExecutionContext, RunError};
use model_loader::{Accelerator, ModelHandle, OnnxGraph};
use std::sync::Arc;
use tensor_core::{DType, Shape, Tensor, TensorData};
use tract_onnx::prelude::{tvec, TValue, Tensor as TractTensor};
use tracing::debug;

/// Runs a tract-optimized ONNX plan
pub struct OnnxContext {
    handle: Arc<ModelHandle>,
    graph: Option<OnnxGraph>,
}

impl OnnxContext {
    pub fn new(handle: Arc<ModelHandle>, graph: OnnxGraph) -> Self {
        debug!("Creating ONNX context for '{}'", handle.name());
        Self {
            handle,
            graph: Some(graph),
        }
    }
}

impl ExecutionContext for OnnxContext {
    fn run(&mut self, input: &Tensor) -> Result<Vec<Tensor>, RunError> {
        let graph = self.graph.as_ref().ok_or(RunError::Destroyed)?;
        check_input(&self.handle, input)?;

        let dims = input.shape().dims();
        let tract_input = match input.data() {
            TensorData::F32(values) => TractTensor::from_shape(dims, values.as_slice()),
            TensorData::U8(values) => TractTensor::from_shape(dims, values.as_slice()),
        }
        .map_err(|e| RunError::ExecutionFault(e.to_string()))?;

        let results = graph
            .run(tvec!(TValue::from(tract_input)))
            .map_err(|e| RunError::ExecutionFault(e.to_string()))?;

        let declared = self.handle.outputs();
        if results.len() < declared.len() {
            return Err(RunError::ExecutionFault(format!(
                "Graph produced {} output(s), model declares {}",
                results.len(),
                declared.len()
            )));
        }

        results
            .iter()
            .zip(declared)
            .map(|(value, spec)| {
                let shape = Shape::new(value.shape().to_vec());
                let data = match spec.dtype {
                    DType::F32 => value.as_slice::<f32>().map(|v| TensorData::F32(v.to_vec())),
                    DType::U8 => value.as_slice::<u8>().map(|v| TensorData::U8(v.to_vec())),
                }
                .map_err(|e| {
                    RunError::ExecutionFault(format!("Output '{}': {}", spec.name, e))
                })?;
                Tensor::new(shape, data).map_err(|e| RunError::ExecutionFault(e.to_string()))
            })
            .collect()
    }

    fn destroy(&mut self) {
        if self.graph.take().is_some() {
            debug!("Destroyed ONNX context for '{}'", self.handle.name());
        }
    }

    fn is_destroyed(&self) -> bool {
        self.graph.is_none()
    }

    /// Recorded only; tract plans execute on the calling thread
    fn thread_count(&self) -> usize {
        self.handle.thread_count()
    }

    fn accelerator(&self) -> Accelerator {
        self.handle.accelerator()
    }
}

impl Drop for OnnxContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextFactory, DefaultContextFactory};
    use model_loader::{
        encode_artifact, BackendKind, LoadOptions, MemoryArtifactStore, ModelLoader, ModelSchema,
        TensorSpec,
    };
    use tensor_core::{ErrorKind, Layout};

    // ONNX TensorProto element types
    const ONNX_FLOAT: u64 = 1;
    const ONNX_UINT8: u64 = 2;

    /// Protobuf message writer, enough for small ONNX graphs
    #[derive(Default)]
    struct Message(Vec<u8>);

    impl Message {
        fn varint(mut self, field: u64, value: u64) -> Self {
            self.write_varint(field << 3);
            self.write_varint(value);
            self
        }

        fn bytes(mut self, field: u64, value: &[u8]) -> Self {
            self.write_varint((field << 3) | 2);
            self.write_varint(value.len() as u64);
            self.0.extend_from_slice(value);
            self
        }

        fn string(self, field: u64, value: &str) -> Self {
            self.bytes(field, value.as_bytes())
        }

        fn message(self, field: u64, value: Message) -> Self {
            self.bytes(field, &value.0)
        }

        fn write_varint(&mut self, mut value: u64) {
            loop {
                let byte = (value & 0x7f) as u8;
                value >>= 7;
                if value == 0 {
                    self.0.push(byte);
                    return;
                }
                self.0.push(byte | 0x80);
            }
        }
    }

    fn value_info(name: &str, elem_type: u64, dims: &[usize]) -> Message {
        let shape = dims.iter().fold(Message::default(), |shape, &d| {
            shape.message(1, Message::default().varint(1, d as u64))
        });
        let tensor = Message::default().varint(1, elem_type).message(2, shape);
        Message::default()
            .string(1, name)
            .message(2, Message::default().message(1, tensor))
    }

    fn node(op_type: &str, input: &str, output: &str) -> Message {
        Message::default()
            .string(1, input)
            .string(2, output)
            .string(3, output)
            .string(4, op_type)
    }

    /// `[1, C, H, W]` image to per-channel means of shape `[1, C]`
    fn pooling_model(elem_type: u64, channels: usize, height: usize, width: usize) -> Vec<u8> {
        let mut graph = Message::default();
        let mut pooled_from = "image";
        if elem_type == ONNX_UINT8 {
            let to_float = Message::default()
                .string(1, "to")
                .varint(3, ONNX_FLOAT)
                .varint(20, 2);
            graph = graph.message(1, node("Cast", "image", "image_f32").message(5, to_float));
            pooled_from = "image_f32";
        }
        let graph = graph
            .message(1, node("GlobalAveragePool", pooled_from, "pooled_map"))
            .message(1, node("Flatten", "pooled_map", "pooled"))
            .string(2, "pooling")
            .message(11, value_info("image", elem_type, &[1, channels, height, width]))
            .message(12, value_info("pooled", ONNX_FLOAT, &[1, channels]));

        Message::default()
            .varint(1, 7)
            .string(2, "edge-infer-tests")
            .message(7, graph)
            .message(8, Message::default().varint(2, 13))
            .0
    }

    fn pooling_context(input: DType, outputs: Vec<TensorSpec>) -> Box<dyn ExecutionContext> {
        let schema = ModelSchema {
            name: "pooling".to_string(),
            backend: BackendKind::Onnx,
            inputs: vec![TensorSpec::image_input("image", input, Layout::Nchw, 2, 2, 3)],
            outputs,
        };
        let elem_type = match input {
            DType::F32 => ONNX_FLOAT,
            DType::U8 => ONNX_UINT8,
        };
        let payload = pooling_model(elem_type, 3, 2, 2);

        let store = MemoryArtifactStore::new();
        store
            .insert("pooling.edgm", encode_artifact(&schema, &payload).unwrap())
            .unwrap();
        let handle = ModelLoader::new(Arc::new(store))
            .load("pooling.edgm", LoadOptions::with_threads(2))
            .unwrap();
        DefaultContextFactory.create(&Arc::new(handle)).unwrap()
    }

    fn pooled() -> TensorSpec {
        TensorSpec::raw("pooled", DType::F32, Shape::new(vec![1, 3]))
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_f32_graph_produces_channel_means() {
        let mut ctx = pooling_context(DType::F32, vec![pooled()]);
        assert_eq!(ctx.thread_count(), 2);

        let input = Tensor::from_f32(
            Shape::new(vec![1, 3, 2, 2]),
            vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0, -2.0, 2.0, 4.0, 8.0],
        )
        .unwrap();
        let outputs = ctx.run(&input).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].shape().dims(), &[1, 3]);
        assert_close(outputs[0].as_f32().unwrap(), &[2.5, 0.0, 3.0]);

        // Context stays usable across runs
        assert!(ctx.run(&input).is_ok());
    }

    #[test]
    fn test_u8_input_is_fed_as_bytes() {
        let mut ctx = pooling_context(DType::U8, vec![pooled()]);
        let input = Tensor::from_u8(
            Shape::new(vec![1, 3, 2, 2]),
            vec![10, 20, 30, 40, 0, 0, 0, 0, 255, 255, 255, 255],
        )
        .unwrap();

        let outputs = ctx.run(&input).unwrap();
        assert_close(outputs[0].as_f32().unwrap(), &[25.0, 0.0, 255.0]);

        let float_input = Tensor::zeros(Shape::new(vec![1, 3, 2, 2]), DType::F32);
        assert_eq!(ctx.run(&float_input).unwrap_err().kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_missing_graph_output_is_fault() {
        let extra = TensorSpec::raw("extra", DType::F32, Shape::new(vec![1, 3]));
        let mut ctx = pooling_context(DType::F32, vec![pooled(), extra]);
        let input = Tensor::zeros(Shape::new(vec![1, 3, 2, 2]), DType::F32);
        assert_eq!(ctx.run(&input).unwrap_err().kind(), ErrorKind::ExecutionFault);
    }

    #[test]
    fn test_output_type_disagreement_is_fault() {
        let bytes = TensorSpec::raw("pooled", DType::U8, Shape::new(vec![1, 3]));
        let mut ctx = pooling_context(DType::F32, vec![bytes]);
        let input = Tensor::zeros(Shape::new(vec![1, 3, 2, 2]), DType::F32);
        assert_eq!(ctx.run(&input).unwrap_err().kind(), ErrorKind::ExecutionFault);
    }

    #[test]
    fn test_destroyed_context_rejects_runs() {
        let mut ctx = pooling_context(DType::F32, vec![pooled()]);
        ctx.destroy();
        ctx.destroy();
        assert!(ctx.is_destroyed());
        let input = Tensor::zeros(Shape::new(vec![1, 3, 2, 2]), DType::F32);
        assert_eq!(ctx.run(&input).unwrap_err().kind(), ErrorKind::InvalidState);
    }
}
