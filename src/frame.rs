// 该文件是 Mingmu （明目） 项目的一部分。
// src/frame.rs - 模型输入/输出张量定义
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

use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 每行前 5 个值: cx, cy, w, h, objectness
pub const BOX_FIELDS: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorShapeError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("输出行长度 {0} 过短, 至少需要 {min} 个值", min = BOX_FIELDS + 1)]
  RowTooShort(usize),
  #[error("不支持的输出形状: {0:?}")]
  UnsupportedShape(Vec<usize>),
}

/// 模型输入张量，形状为 [1, size, size, 3]，通道在后，数值范围 [0.0, 1.0]
#[derive(Debug, Clone)]
pub struct NhwcTensor {
  size: u32,
  data: Box<[f32]>,
}

impl NhwcTensor {
  pub fn new(size: u32, data: Vec<f32>) -> Result<Self, TensorShapeError> {
    let expected = RGB_CHANNELS * size as usize * size as usize;
    if data.len() != expected {
      return Err(TensorShapeError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      size,
      data: data.into_boxed_slice(),
    })
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn shape(&self) -> [usize; 4] {
    let s = self.size as usize;
    [1, s, s, RGB_CHANNELS]
  }

  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }
}

/// 模型原始输出，形状为 [1, num_anchors, 5 + num_classes]
///
/// 每行布局: `[cx, cy, w, h, objectness, class0, class1, ...]`，
/// 坐标以模型输入像素为单位。
#[derive(Debug, Clone)]
pub struct DetectionTensor {
  num_anchors: usize,
  row_len: usize,
  data: Box<[f32]>,
}

impl DetectionTensor {
  pub fn new(num_anchors: usize, row_len: usize, data: Vec<f32>) -> Result<Self, TensorShapeError> {
    if row_len <= BOX_FIELDS {
      return Err(TensorShapeError::RowTooShort(row_len));
    }

    let expected = num_anchors * row_len;
    if data.len() != expected {
      return Err(TensorShapeError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      num_anchors,
      row_len,
      data: data.into_boxed_slice(),
    })
  }

  /// 接受 `[1, N, R]` 或 `[N, R]` 形状
  pub fn from_shape(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorShapeError> {
    match *shape {
      [1, num_anchors, row_len] | [num_anchors, row_len] => Self::new(num_anchors, row_len, data),
      _ => Err(TensorShapeError::UnsupportedShape(shape.to_vec())),
    }
  }

  /// 由逐行数据构造，主要用于合成测试
  pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, TensorShapeError> {
    let row_len = rows.first().map(|r| r.as_ref().len()).unwrap_or(BOX_FIELDS + 1);
    let mut data = Vec::with_capacity(rows.len() * row_len);
    for row in rows {
      let row = row.as_ref();
      if row.len() != row_len {
        return Err(TensorShapeError::LengthMismatch {
          expected: row_len,
          actual: row.len(),
        });
      }
      data.extend_from_slice(row);
    }
    Self::new(rows.len(), row_len, data)
  }

  pub fn num_anchors(&self) -> usize {
    self.num_anchors
  }

  pub fn num_classes(&self) -> usize {
    self.row_len - BOX_FIELDS
  }

  pub fn shape(&self) -> [usize; 3] {
    [1, self.num_anchors, self.row_len]
  }

  pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
    self.data.chunks_exact(self.row_len)
  }
}
