// 该文件是 Mingmu （明目） 项目的一部分。
// src/model/mapping.rs - 坐标映射
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

use tracing::warn;

use crate::model::{Detection, ImageSpace, ModelSpace};

/// 从模型坐标系线性缩放回原图坐标系
///
/// 两个轴独立缩放（预处理不做 letterbox），结果不裁剪到图像范围内。
/// `input_size` 为 0 时没有有效的缩放比例，返回空列表。
pub fn map_to_original(
  detections: Vec<Detection<ModelSpace>>,
  input_size: u32,
  orig_width: u32,
  orig_height: u32,
) -> Vec<Detection<ImageSpace>> {
  if input_size == 0 {
    warn!("模型输入尺寸为 0, 丢弃 {} 个检测结果", detections.len());
    return Vec::new();
  }

  let scale_x = orig_width as f32 / input_size as f32;
  let scale_y = orig_height as f32 / input_size as f32;

  detections
    .into_iter()
    .map(|d| d.map_bbox(|b| b.scale(scale_x, scale_y)))
    .collect()
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::model::BBox;

  fn det(bbox: BBox) -> Detection<ModelSpace> {
    Detection::new(Arc::from("person"), 0, 0.81, bbox)
  }

  #[test]
  fn scales_each_axis_independently() {
    let out = map_to_original(
      vec![det(BBox::new(270.0, 270.0, 370.0, 370.0))],
      640,
      1280,
      960,
    );
    assert_eq!(out[0].bbox, BBox::new(540.0, 405.0, 740.0, 555.0));
    assert_eq!(out[0].confidence, 0.81);
  }

  #[test]
  fn zero_input_size_yields_no_detections() {
    let out = map_to_original(vec![det(BBox::new(1.0, 2.0, 3.0, 4.0))], 0, 640, 480);
    assert!(out.is_empty());
  }

  #[test]
  fn same_size_is_identity() {
    let boxes = [
      BBox::new(270.0, 270.0, 370.0, 370.0),
      BBox::new(-3.5, 0.25, 641.0, 12.75),
    ];
    let out = map_to_original(boxes.iter().copied().map(det).collect(), 640, 640, 640);
    for (mapped, original) in out.iter().zip(boxes) {
      assert_eq!(mapped.bbox, original);
    }
  }

  #[test]
  fn results_are_not_clamped() {
    let out = map_to_original(vec![det(BBox::new(-10.0, 600.0, 700.0, 660.0))], 640, 320, 320);
    assert_eq!(out[0].bbox, BBox::new(-5.0, 300.0, 350.0, 330.0));
  }
}
