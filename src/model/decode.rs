// 该文件是 Mingmu （明目） 项目的一部分。
// src/model/decode.rs - 原始输出解码
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

use crate::{
  frame::{BOX_FIELDS, DetectionTensor},
  model::{BBox, Detection, LabelTable, ModelSpace},
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// 把模型输出的每一行解码为候选检测（模型坐标系）
///
/// 低置信度、类别越界或数值异常的行被直接丢弃，不视为错误。
#[derive(Debug, Clone)]
pub struct DetectionDecoder<'a> {
  labels: &'a LabelTable,
  objectness_threshold: f32,
  confidence_threshold: f32,
}

impl<'a> DetectionDecoder<'a> {
  pub fn new(labels: &'a LabelTable) -> Self {
    Self {
      labels,
      objectness_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
    }
  }

  pub fn objectness_threshold(mut self, threshold: f32) -> Self {
    self.objectness_threshold = threshold;
    self
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  /// 行内几何量已是模型输入像素，解码不需要输入尺寸
  pub fn decode(&self, output: &DetectionTensor) -> Vec<Detection<ModelSpace>> {
    let items: Vec<_> = output.rows().filter_map(|row| self.decode_row(row)).collect();
    debug!(
      "解码 {} 行输出, 得到 {} 个候选框",
      output.num_anchors(),
      items.len()
    );
    items
  }

  fn decode_row(&self, row: &[f32]) -> Option<Detection<ModelSpace>> {
    // NaN 不满足 >=，一并丢弃
    let objectness = row[4];
    if !(objectness >= self.objectness_threshold) {
      return None;
    }

    let (class_id, max_score) = argmax(&row[BOX_FIELDS..])?;

    let confidence = (objectness * max_score).min(1.0);
    if !(confidence >= self.confidence_threshold) {
      return None;
    }

    let label = self.labels.get(class_id)?;

    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
      return None;
    }

    Some(Detection::new(
      label.clone(),
      class_id,
      confidence,
      BBox::from_center(cx, cy, w, h),
    ))
  }
}

/// 取最大分数及其索引，并列时取第一个；全部分数都不为正则视为无类别
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (idx, &score) in scores.iter().enumerate() {
    if score > best.map_or(0.0, |(_, s)| s) {
      best = Some((idx, score));
    }
  }
  best
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels() -> LabelTable {
    LabelTable::from_lines(["a", "b", "c", "d"])
  }

  fn row(cx: f32, cy: f32, w: f32, h: f32, obj: f32, scores: [f32; 4]) -> Vec<f32> {
    let mut r = vec![cx, cy, w, h, obj];
    r.extend_from_slice(&scores);
    r
  }

  #[test]
  fn decodes_single_confident_row() {
    let labels = labels();
    let out = DetectionTensor::from_rows(&[row(
      320.0,
      320.0,
      100.0,
      100.0,
      0.9,
      [0.01, 0.02, 0.9, 0.0],
    )])
    .unwrap();

    let items = DetectionDecoder::new(&labels).decode(&out);
    assert_eq!(items.len(), 1);
    let d = &items[0];
    assert_eq!(&*d.label, "c");
    assert_eq!(d.class_id, 2);
    assert!((d.confidence - 0.81).abs() < 1e-6);
    assert_eq!(d.bbox, BBox::new(270.0, 270.0, 370.0, 370.0));
  }

  #[test]
  fn objectness_prefilter_discards_row() {
    let labels = labels();
    let out =
      DetectionTensor::from_rows(&[row(10.0, 10.0, 4.0, 4.0, 0.29, [1.0, 0.0, 0.0, 0.0])]).unwrap();
    assert!(DetectionDecoder::new(&labels).decode(&out).is_empty());
  }

  #[test]
  fn combined_confidence_is_an_independent_filter() {
    let labels = labels();
    // objectness 0.5 通过，但 0.5 * 0.5 = 0.25 < 0.3
    let out =
      DetectionTensor::from_rows(&[row(10.0, 10.0, 4.0, 4.0, 0.5, [0.5, 0.1, 0.0, 0.0])]).unwrap();
    assert!(DetectionDecoder::new(&labels).decode(&out).is_empty());

    let items = DetectionDecoder::new(&labels)
      .confidence_threshold(0.2)
      .decode(&out);
    assert_eq!(items.len(), 1);
  }

  #[test]
  fn unnormalised_scores_are_clamped_to_one() {
    let labels = labels();
    let out =
      DetectionTensor::from_rows(&[row(10.0, 10.0, 4.0, 4.0, 1.5, [2.0, 0.0, 0.0, 0.0])]).unwrap();
    let items = DetectionDecoder::new(&labels).decode(&out);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].confidence, 1.0);
  }

  #[test]
  fn ties_pick_lowest_class_index() {
    let labels = labels();
    let out =
      DetectionTensor::from_rows(&[row(10.0, 10.0, 4.0, 4.0, 1.0, [0.2, 0.7, 0.7, 0.1])]).unwrap();
    let items = DetectionDecoder::new(&labels).decode(&out);
    assert_eq!(items[0].class_id, 1);
  }

  #[test]
  fn class_outside_label_table_is_dropped() {
    let labels = LabelTable::from_lines(["a", "b"]);
    let out =
      DetectionTensor::from_rows(&[row(10.0, 10.0, 4.0, 4.0, 0.9, [0.1, 0.1, 0.1, 0.95])]).unwrap();
    assert!(DetectionDecoder::new(&labels).decode(&out).is_empty());
  }

  #[test]
  fn out_of_frame_boxes_are_not_clamped() {
    let labels = labels();
    let out =
      DetectionTensor::from_rows(&[row(-5.0, 630.0, 40.0, 40.0, 0.9, [0.9, 0.0, 0.0, 0.0])])
        .unwrap();
    let items = DetectionDecoder::new(&labels).decode(&out);
    assert_eq!(items[0].bbox, BBox::new(-25.0, 610.0, 15.0, 650.0));
  }

  #[test]
  fn non_finite_rows_are_dropped() {
    let labels = labels();
    let out = DetectionTensor::from_rows(&[
      row(10.0, 10.0, 4.0, 4.0, f32::NAN, [0.9, 0.0, 0.0, 0.0]),
      row(f32::INFINITY, 10.0, 4.0, 4.0, 0.9, [0.9, 0.0, 0.0, 0.0]),
      row(10.0, 10.0, 4.0, 4.0, 0.9, [f32::NAN, 0.0, 0.0, 0.0]),
    ])
    .unwrap();
    assert!(DetectionDecoder::new(&labels).decode(&out).is_empty());
  }

  #[test]
  fn all_rows_below_threshold_yield_nothing() {
    let labels = labels();
    let rows: Vec<_> = (0..16)
      .map(|i| row(i as f32, i as f32, 2.0, 2.0, 0.1, [0.9, 0.9, 0.9, 0.9]))
      .collect();
    let out = DetectionTensor::from_rows(&rows).unwrap();
    assert!(DetectionDecoder::new(&labels).decode(&out).is_empty());
  }
}
