// 该文件是 Mingmu （明目） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use ort::{
  inputs,
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{DetectionTensor, NhwcTensor, TensorShapeError},
  model::{DetectError, InferenceEngine},
};

const DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum OnnxEngineError {
  #[error("ONNX Runtime 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("模型输出形状错误: {0}")]
  Shape(#[from] TensorShapeError),
  #[error("模型没有输入")]
  NoInput,
}

pub struct OnnxEngine {
  session: Session,
  input_name: String,
}

pub struct OnnxEngineBuilder {
  model_path: String,
  intra_threads: usize,
}

impl FromUrlWithScheme for OnnxEngineBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxEngineBuilder {
  type Error = DetectError;

  /// `onnx:///path/to/model.onnx?threads=4`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectError::load(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut builder = OnnxEngineBuilder::new(url.path());
    for (k, v) in url.query_pairs() {
      if k == "threads" {
        let threads = v
          .parse()
          .map_err(|e| DetectError::load_with(format!("无效的线程数: {}", v), e))?;
        builder = builder.intra_threads(threads);
      }
    }
    Ok(builder)
  }
}

impl OnnxEngineBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      intra_threads: DEFAULT_INTRA_THREADS,
    }
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads;
    self
  }

  pub fn build(self) -> Result<OnnxEngine, DetectError> {
    info!("加载模型文件: {}", self.model_path);
    let session = Session::builder()
      .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
      .and_then(|b| b.with_intra_threads(self.intra_threads))
      .and_then(|b| b.commit_from_file(&self.model_path))
      .map_err(|e| DetectError::load_with(format!("无法加载模型: {}", self.model_path), e))?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .ok_or_else(|| DetectError::load_with("模型没有输入", OnnxEngineError::NoInput))?;

    debug!("模型输入数量: {}", session.inputs.len());
    debug!("模型输出数量: {}", session.outputs.len());
    info!("模型加载完成, 输入名称: {}", input_name);

    Ok(OnnxEngine {
      session,
      input_name,
    })
  }
}

impl InferenceEngine for OnnxEngine {
  type Error = OnnxEngineError;

  fn run(&mut self, input: &NhwcTensor) -> Result<DetectionTensor, Self::Error> {
    let tensor = Tensor::from_array((input.shape(), input.as_nhwc().to_vec()))?;

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(inputs![self.input_name.as_str() => tensor])?;

    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!("模型输出形状: {:?}", dims);

    Ok(DetectionTensor::from_shape(&dims, data.to_vec())?)
  }
}
