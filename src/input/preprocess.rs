// 该文件是 Mingmu （明目） 项目的一部分。
// src/input/preprocess.rs - 图像预处理
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

use std::borrow::Cow;

use image::{RgbImage, imageops::FilterType};

use crate::{frame::NhwcTensor, model::DetectError};

/// 缩放到 `input_size x input_size` 并归一化到 [0.0, 1.0]
///
/// 两个轴独立缩放，不保持宽高比；输出为行优先、通道交错的 RGB 数据。
pub fn preprocess(image: &RgbImage, input_size: u32) -> Result<NhwcTensor, DetectError> {
  let (width, height) = image.dimensions();
  if width == 0 || height == 0 {
    return Err(DetectError::InvalidImage(format!(
      "图像尺寸为 {}x{}",
      width, height
    )));
  }
  if input_size == 0 {
    return Err(DetectError::InvalidImage("目标尺寸为 0".to_string()));
  }

  let resized = if (width, height) == (input_size, input_size) {
    Cow::Borrowed(image)
  } else {
    // Triangle 即双线性插值
    Cow::Owned(image::imageops::resize(
      image,
      input_size,
      input_size,
      FilterType::Triangle,
    ))
  };

  let data: Vec<f32> = resized.as_raw().iter().map(|&v| v as f32 / 255.0).collect();

  NhwcTensor::new(input_size, data).map_err(|e| DetectError::InvalidImage(e.to_string()))
}
