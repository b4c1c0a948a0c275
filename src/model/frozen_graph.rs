use std::{fs, path::Path};

use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
use tracing::debug;

use super::{Classifier, ModelError};
use crate::{config::TensorLayout, preprocess::ImageTensor};

#[derive(Debug, Clone)]
pub struct FrozenGraphOptions {
    pub input_op: String,
    pub output_op: String,
    pub layout: TensorLayout,
}

/// Classifier backed by a frozen TensorFlow `GraphDef`.
///
/// A frozen graph has its weights baked in as constants and carries no
/// training-only ops, so it always runs in inference mode.
pub struct FrozenGraphModel {
    session: Session,
    graph: Graph,
    options: FrozenGraphOptions,
}

impl FrozenGraphModel {
    pub fn load(path: &Path, options: FrozenGraphOptions) -> Result<Self, ModelError> {
        let model_bytes = fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut graph = Graph::new();
        graph.import_graph_def(&model_bytes, &ImportGraphDefOptions::new())?;

        // Fail at load time rather than on the first request.
        graph.operation_by_name_required(&options.input_op)?;
        graph.operation_by_name_required(&options.output_op)?;

        let session = Session::new(&SessionOptions::new(), &graph)?;
        debug!(
            input = %options.input_op,
            output = %options.output_op,
            layout = %options.layout,
            "frozen graph imported"
        );

        Ok(FrozenGraphModel {
            session,
            graph,
            options,
        })
    }
}

impl Classifier for FrozenGraphModel {
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        let (dims, data) = match self.options.layout {
            TensorLayout::Nchw => (input.dims().to_vec(), input.as_slice().to_vec()),
            TensorLayout::Nhwc => input.to_nhwc(),
        };
        let dims: Vec<u64> = dims.into_iter().map(|d| d as u64).collect();
        let input_tensor = Tensor::<f32>::new(&dims).with_values(&data)?;

        let input_operation = self
            .graph
            .operation_by_name_required(&self.options.input_op)?;
        let output_operation = self
            .graph
            .operation_by_name_required(&self.options.output_op)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        self.session.run(&mut args)?;

        let output_tensor: Tensor<f32> = args.fetch(output_token)?;
        Ok(output_tensor.to_vec())
    }
}
