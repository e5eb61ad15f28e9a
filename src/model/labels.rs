// 该文件是 Mingmu （明目） 项目的一部分。
// src/model/labels.rs - 类别标签表
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

use std::{path::Path, sync::Arc};

use tracing::{debug, info};

use crate::model::DetectError;

/// COCO 数据集类别名称
const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 类别标签表，行号即类别索引，加载后不可变
#[derive(Debug, Clone)]
pub struct LabelTable {
  labels: Arc<[Arc<str>]>,
}

impl LabelTable {
  /// 从文本文件加载，每行一个标签
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DetectError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path)
      .map_err(|e| DetectError::load_with(format!("无法读取标签文件 {}", path.display()), e))?;

    let table = Self::from_lines(text.lines());
    if table.is_empty() {
      return Err(DetectError::load(format!(
        "标签文件为空: {}",
        path.display()
      )));
    }

    debug!("标签数量: {}", table.len());
    Ok(table)
  }

  /// 末尾空行被忽略，中间空行保留以免索引错位
  pub fn from_lines<I, T>(lines: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    let mut labels: Vec<Arc<str>> = lines
      .into_iter()
      .map(|line| Arc::from(line.as_ref().trim_end_matches('\r')))
      .collect();

    while labels.last().is_some_and(|l| l.trim().is_empty()) {
      labels.pop();
    }

    Self {
      labels: labels.into(),
    }
  }

  pub fn coco() -> Self {
    Self::from_lines(COCO_CLASSES)
  }

  pub fn get(&self, class_id: usize) -> Option<&Arc<str>> {
    self.labels.get(class_id)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn trailing_blank_lines_are_ignored() {
    let table = LabelTable::from_lines(["person", "bicycle", "", "  ", ""]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1).map(|l| &**l), Some("bicycle"));
    assert!(table.get(2).is_none());
  }

  #[test]
  fn interior_blank_lines_keep_indices() {
    let table = LabelTable::from_lines(["a", "", "c"]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(2).map(|l| &**l), Some("c"));
  }

  #[test]
  fn coco_has_eighty_classes() {
    let table = LabelTable::coco();
    assert_eq!(table.len(), 80);
    assert_eq!(table.get(0).map(|l| &**l), Some("person"));
    assert_eq!(table.get(79).map(|l| &**l), Some("toothbrush"));
  }

  #[test]
  fn loads_file_with_crlf_line_endings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "person\r\ncar\r\n\r\n").unwrap();
    let table = LabelTable::from_file(file.path()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1).map(|l| &**l), Some("car"));
  }

  #[test]
  fn empty_or_missing_file_is_load_failure() {
    let file = tempfile::NamedTempFile::new().unwrap();
    assert!(matches!(
      LabelTable::from_file(file.path()),
      Err(DetectError::ModelLoadFailure { .. })
    ));
    assert!(matches!(
      LabelTable::from_file("/nonexistent/labels.txt"),
      Err(DetectError::ModelLoadFailure { source: Some(_), .. })
    ));
  }
}
