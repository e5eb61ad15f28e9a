// 该文件是 Mingmu （明目） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::model::{BBox, Detection};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// 按类别分组的贪心 NMS，结果数量有上限
#[derive(Debug, Clone, Copy)]
pub struct Suppressor {
  pub iou_threshold: f32,
  pub max_results: usize,
}

impl Default for Suppressor {
  fn default() -> Self {
    Self {
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_results: DEFAULT_MAX_RESULTS,
    }
  }
}

impl Suppressor {
  pub fn new(iou_threshold: f32, max_results: usize) -> Self {
    Self {
      iou_threshold,
      max_results,
    }
  }

  /// 结果按置信度降序排列；不同标签的框互不抑制
  pub fn suppress<S>(&self, mut detections: Vec<Detection<S>>) -> Vec<Detection<S>> {
    // 稳定排序，置信度相同时保持输入顺序
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut suppressed = vec![false; detections.len()];
    let mut kept = vec![false; detections.len()];
    let mut accepted = 0usize;

    for i in 0..detections.len() {
      if accepted >= self.max_results {
        break;
      }
      if suppressed[i] {
        continue;
      }

      kept[i] = true;
      accepted += 1;

      let best = &detections[i];
      for j in (i + 1)..detections.len() {
        if suppressed[j] {
          continue;
        }
        let other = &detections[j];
        if best.label == other.label && iou(&best.bbox, &other.bbox) > self.iou_threshold {
          suppressed[j] = true;
        }
      }
    }

    debug!(
      "NMS: {} 个候选框保留 {} 个",
      detections.len(),
      accepted
    );

    detections
      .into_iter()
      .zip(kept)
      .filter_map(|(d, keep)| keep.then_some(d))
      .collect()
  }
}

/// 两个轴对齐框的交并比；不相交或任一面积为零时为 0
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  let left = a.left.max(b.left);
  let top = a.top.max(b.top);
  let right = a.right.min(b.right);
  let bottom = a.bottom.min(b.bottom);

  if right < left || bottom < top {
    return 0.0;
  }

  let area_a = a.area();
  let area_b = b.area();
  if area_a <= 0.0 || area_b <= 0.0 {
    return 0.0;
  }

  let intersection = (right - left) * (bottom - top);
  let union = area_a + area_b - intersection;
  if union > 0.0 { intersection / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::model::ModelSpace;

  fn det(label: &str, confidence: f32, bbox: [f32; 4]) -> Detection<ModelSpace> {
    let [l, t, r, b] = bbox;
    Detection::new(Arc::from(label), 0, confidence, BBox::new(l, t, r, b))
  }

  #[test]
  fn iou_of_identical_box_is_one() {
    let b = BBox::new(10.0, 20.0, 110.0, 70.0);
    assert_eq!(iou(&b, &b), 1.0);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = BBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BBox::new(20.0, 20.0, 30.0, 30.0);
    assert_eq!(iou(&a, &b), 0.0);
    // 只在一个轴上分离
    let c = BBox::new(20.0, 0.0, 30.0, 10.0);
    assert_eq!(iou(&a, &c), 0.0);
  }

  #[test]
  fn iou_of_partial_overlap() {
    let a = BBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BBox::new(5.0, 0.0, 15.0, 10.0);
    // 50 / 150
    assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_degenerate_boxes_is_zero_not_nan() {
    let point = BBox::new(5.0, 5.0, 5.0, 5.0);
    assert_eq!(iou(&point, &point), 0.0);
    let line = BBox::new(0.0, 5.0, 10.0, 5.0);
    let square = BBox::new(0.0, 0.0, 10.0, 10.0);
    assert_eq!(iou(&line, &square), 0.0);
  }

  #[test]
  fn empty_input_gives_empty_output() {
    let out: Vec<Detection<ModelSpace>> = Suppressor::default().suppress(Vec::new());
    assert!(out.is_empty());
  }

  #[test]
  fn keeps_only_best_of_overlapping_same_label() {
    let out = Suppressor::default().suppress(vec![
      det("dog", 0.8, [12.0, 12.0, 112.0, 112.0]),
      det("dog", 0.9, [10.0, 10.0, 110.0, 110.0]),
    ]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].confidence, 0.9);
  }

  #[test]
  fn different_labels_never_suppress_each_other() {
    let out = Suppressor::default().suppress(vec![
      det("dog", 0.9, [10.0, 10.0, 110.0, 110.0]),
      det("cat", 0.8, [10.0, 10.0, 110.0, 110.0]),
    ]);
    assert_eq!(out.len(), 2);
  }

  #[test]
  fn iou_equal_to_threshold_is_not_suppressed() {
    // IoU = 50 / 150 = 1/3
    let s = Suppressor::new(1.0 / 3.0, 10);
    let out = s.suppress(vec![
      det("dog", 0.9, [0.0, 0.0, 10.0, 10.0]),
      det("dog", 0.8, [5.0, 0.0, 15.0, 10.0]),
    ]);
    assert_eq!(out.len(), 2);
  }

  #[test]
  fn suppressed_box_does_not_suppress_others() {
    // b 被 a 抑制，c 只和 b 重叠，因此保留
    let out = Suppressor::new(0.3, 10).suppress(vec![
      det("dog", 0.9, [0.0, 0.0, 10.0, 10.0]),
      det("dog", 0.8, [2.0, 0.0, 12.0, 10.0]),
      det("dog", 0.7, [9.0, 0.0, 19.0, 10.0]),
    ]);
    let confidences: Vec<f32> = out.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.7]);
  }

  #[test]
  fn output_is_capped_and_sorted() {
    let input: Vec<_> = (0..25)
      .map(|i| {
        let x = i as f32 * 100.0;
        det("car", (i % 7) as f32 / 10.0 + 0.05, [x, 0.0, x + 50.0, 50.0])
      })
      .collect();
    let out = Suppressor::default().suppress(input);
    assert_eq!(out.len(), DEFAULT_MAX_RESULTS);
    assert!(out.windows(2).all(|w| w[0].confidence >= w[1].confidence));
  }

  #[test]
  fn zero_cap_yields_nothing() {
    let out = Suppressor::new(0.3, 0).suppress(vec![det("a", 0.9, [0.0, 0.0, 1.0, 1.0])]);
    assert!(out.is_empty());
  }

  #[test]
  fn same_label_survivors_never_overlap_beyond_threshold() {
    let mut input = Vec::new();
    for i in 0..40 {
      let x = (i * 7 % 23) as f32 * 3.0;
      let y = (i * 5 % 17) as f32 * 3.0;
      let label = if i % 3 == 0 { "a" } else { "b" };
      input.push(det(label, 0.3 + (i % 11) as f32 / 20.0, [x, y, x + 20.0, y + 20.0]));
    }
    let s = Suppressor::new(0.3, 100);
    let out = s.suppress(input);
    for (i, a) in out.iter().enumerate() {
      for b in &out[i + 1..] {
        if a.label == b.label {
          assert!(iou(&a.bbox, &b.bbox) <= s.iou_threshold);
        }
      }
    }
  }
}
