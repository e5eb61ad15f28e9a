// 该文件是 Mingmu （明目） 项目的一部分。
// src/model/detector.rs - 检测流水线
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

use std::{path::PathBuf, sync::Mutex};

use image::RgbImage;
use tracing::{debug, info};

use crate::{
  frame::DetectionTensor,
  input::preprocess,
  model::{
    DetectError, DetectResult, DetectionDecoder, ImageSpace, InferenceEngine, LabelTable, Model,
    Suppressor, decode::DEFAULT_CONFIDENCE_THRESHOLD, map_to_original,
    nms::{DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_RESULTS},
  },
};

pub const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  pub input_size: u32,
  pub objectness_threshold: f32,
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub max_results: usize,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      objectness_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_results: DEFAULT_MAX_RESULTS,
    }
  }
}

impl DetectorConfig {
  pub fn validate(&self) -> Result<(), DetectError> {
    if self.input_size == 0 {
      return Err(DetectError::InvalidConfig("输入尺寸不能为 0".to_string()));
    }

    for (name, value) in [
      ("objectness_threshold", self.objectness_threshold),
      ("confidence_threshold", self.confidence_threshold),
      ("iou_threshold", self.iou_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(DetectError::InvalidConfig(format!(
          "{} 必须在 [0, 1] 范围内, 实际为 {}",
          name, value
        )));
      }
    }

    Ok(())
  }
}

#[derive(Debug, Default)]
pub struct DetectorBuilder {
  config: DetectorConfig,
  labels_path: Option<PathBuf>,
  labels: Option<LabelTable>,
}

impl DetectorBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn config(mut self, config: DetectorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn labels_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.labels_path = Some(path.into());
    self
  }

  pub fn labels(mut self, labels: LabelTable) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn build<E: InferenceEngine>(self, engine: E) -> Result<Detector<E>, DetectError> {
    self.config.validate()?;

    let labels = match (self.labels, self.labels_path) {
      (Some(labels), _) => labels,
      (None, Some(path)) => LabelTable::from_file(path)?,
      (None, None) => {
        info!("未指定标签文件, 使用内置 COCO 标签");
        LabelTable::coco()
      }
    };

    if labels.is_empty() {
      return Err(DetectError::load("标签表为空"));
    }

    info!(
      "检测器就绪: 输入尺寸 {}, 类别数 {}, 置信度阈值 {}, IoU 阈值 {}, 最大结果数 {}",
      self.config.input_size,
      labels.len(),
      self.config.confidence_threshold,
      self.config.iou_threshold,
      self.config.max_results
    );

    Ok(Detector {
      engine: Mutex::new(engine),
      labels,
      config: self.config,
    })
  }
}

/// 一次完整的检测周期: 预处理 -> 推理 -> 解码 -> NMS -> 坐标映射
///
/// 引擎句柄由互斥锁保护，同一个检测器可以在多个线程间共享。
pub struct Detector<E> {
  engine: Mutex<E>,
  labels: LabelTable,
  config: DetectorConfig,
}

impl<E: InferenceEngine> Detector<E> {
  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn detect(&self, image: &RgbImage) -> Result<DetectResult<ImageSpace>, DetectError> {
    let tensor = preprocess(image, self.config.input_size)?;

    let output = {
      let mut engine = self
        .engine
        .lock()
        .map_err(|e| DetectError::InferenceFailure(e.to_string().into()))?;
      engine.run(&tensor).map_err(DetectError::inference)?
    };
    debug!("模型输出形状: {:?}", output.shape());

    Ok(self.postprocess(&output, image.width(), image.height()))
  }

  /// 对原始输出做解码、NMS 和坐标映射，不涉及引擎
  pub fn postprocess(
    &self,
    output: &DetectionTensor,
    orig_width: u32,
    orig_height: u32,
  ) -> DetectResult<ImageSpace> {
    let candidates = DetectionDecoder::new(&self.labels)
      .objectness_threshold(self.config.objectness_threshold)
      .confidence_threshold(self.config.confidence_threshold)
      .decode(output);

    let kept = Suppressor::new(self.config.iou_threshold, self.config.max_results).suppress(candidates);

    let items = map_to_original(kept, self.config.input_size, orig_width, orig_height);
    debug!("检测到 {} 个物体", items.len());

    DetectResult::from(items)
  }
}

impl<E: InferenceEngine> Model for Detector<E> {
  type Input = RgbImage;
  type Output = DetectResult<ImageSpace>;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::NhwcTensor;

  #[derive(Debug, thiserror::Error)]
  #[error("engine exploded")]
  struct Boom;

  struct FailingEngine;

  impl InferenceEngine for FailingEngine {
    type Error = Boom;

    fn run(&mut self, _input: &NhwcTensor) -> Result<DetectionTensor, Self::Error> {
      Err(Boom)
    }
  }

  #[test]
  fn default_config_matches_reference_behaviour() {
    let config = DetectorConfig::default();
    assert_eq!(config.input_size, 640);
    assert_eq!(config.objectness_threshold, 0.3);
    assert_eq!(config.confidence_threshold, 0.3);
    assert_eq!(config.iou_threshold, 0.3);
    assert_eq!(config.max_results, 10);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn invalid_config_is_rejected_at_build() {
    let config = DetectorConfig {
      iou_threshold: 1.5,
      ..Default::default()
    };
    assert!(matches!(
      DetectorBuilder::new().config(config).build(FailingEngine),
      Err(DetectError::InvalidConfig(_))
    ));

    let config = DetectorConfig {
      input_size: 0,
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn empty_label_table_is_load_failure() {
    let result = DetectorBuilder::new()
      .labels(LabelTable::from_lines(Vec::<String>::new()))
      .build(FailingEngine);
    assert!(matches!(result, Err(DetectError::ModelLoadFailure { .. })));
  }

  #[test]
  fn engine_error_aborts_cycle() {
    let detector = DetectorBuilder::new().build(FailingEngine).unwrap();
    let image = RgbImage::new(32, 32);
    let err = detector.detect(&image).unwrap_err();
    assert!(matches!(err, DetectError::InferenceFailure(_)));
    assert!(err.to_string().contains("engine exploded"));
  }

  #[test]
  fn zero_sized_image_fails_before_inference() {
    let detector = DetectorBuilder::new().build(FailingEngine).unwrap();
    let image = RgbImage::new(0, 0);
    assert!(matches!(
      detector.infer(&image),
      Err(DetectError::InvalidImage(_))
    ));
  }
}
