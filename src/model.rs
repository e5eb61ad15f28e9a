// 该文件是 Mingmu （明目） 项目的一部分。
// src/model.rs - 模型与检测结果
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

use std::{marker::PhantomData, sync::Arc};

use thiserror::Error;

use crate::frame::{DetectionTensor, NhwcTensor};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎：张量输入，张量输出
///
/// 引擎实现不需要可重入，`Detector` 会在调用前加锁。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn run(&mut self, input: &NhwcTensor) -> Result<DetectionTensor, Self::Error>;
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("无效图像: {0}")]
  InvalidImage(String),
  #[error("无效配置: {0}")]
  InvalidConfig(String),
  #[error("模型加载失败: {reason}")]
  ModelLoadFailure {
    reason: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
  },
  #[error("推理失败: {0}")]
  InferenceFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DetectError {
  pub fn load(reason: impl Into<String>) -> Self {
    DetectError::ModelLoadFailure {
      reason: reason.into(),
      source: None,
    }
  }

  pub fn load_with<E>(reason: impl Into<String>, e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::ModelLoadFailure {
      reason: reason.into(),
      source: Some(Box::new(e)),
    }
  }

  pub fn inference<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::InferenceFailure(Box::new(e))
  }
}

/// 模型输入坐标系（0..input_size 像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpace;

/// 原始图像坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpace;

/// 轴对齐边界框，角点形式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl BBox {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  /// 中心形式转角点形式，宽高为负时交换边以保持 left <= right, top <= bottom
  pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    let (x0, x1) = (cx - w / 2.0, cx + w / 2.0);
    let (y0, y1) = (cy - h / 2.0, cy + h / 2.0);
    Self {
      left: x0.min(x1),
      top: y0.min(y1),
      right: x0.max(x1),
      bottom: y0.max(y1),
    }
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  pub fn scale(&self, sx: f32, sy: f32) -> Self {
    Self {
      left: self.left * sx,
      top: self.top * sy,
      right: self.right * sx,
      bottom: self.bottom * sy,
    }
  }

  pub fn to_array(&self) -> [f32; 4] {
    [self.left, self.top, self.right, self.bottom]
  }
}

/// 单个检测结果，`S` 标记坐标所在的坐标系
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<S> {
  pub label: Arc<str>,
  pub class_id: usize,
  pub confidence: f32,
  pub bbox: BBox,
  _space: PhantomData<S>,
}

impl<S> Detection<S> {
  pub fn new(label: Arc<str>, class_id: usize, confidence: f32, bbox: BBox) -> Self {
    Self {
      label,
      class_id,
      confidence,
      bbox,
      _space: PhantomData,
    }
  }

  /// 几何变换产生新实例，不修改原值
  pub fn map_bbox<T>(self, f: impl FnOnce(&BBox) -> BBox) -> Detection<T> {
    Detection {
      bbox: f(&self.bbox),
      label: self.label,
      class_id: self.class_id,
      confidence: self.confidence,
      _space: PhantomData,
    }
  }
}

#[derive(Debug, Clone)]
pub struct DetectResult<S> {
  pub items: Box<[Detection<S>]>,
}

impl<S> DetectResult<S> {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection<S>> {
    self.items.iter()
  }
}

impl<S> From<Vec<Detection<S>>> for DetectResult<S> {
  fn from(items: Vec<Detection<S>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod labels;
pub use self::labels::LabelTable;

pub mod decode;
pub use self::decode::DetectionDecoder;

pub mod nms;
pub use self::nms::{Suppressor, iou};

pub mod mapping;
pub use self::mapping::map_to_original;

mod detector;
pub use self::detector::{DEFAULT_INPUT_SIZE, Detector, DetectorBuilder, DetectorConfig};

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxEngine, OnnxEngineBuilder, OnnxEngineError};
