// 该文件是 Mingmu （明目） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
};

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, ImageSpace},
  output::{Render, draw::Draw, result_to_json},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 每帧的保存方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
  /// 保存绘制了检测框的图像
  Draw,
  /// 保存原图和 `.txt` 记录，标签写名称
  RecordName,
  /// 保存原图和 `.txt` 记录，标签写索引
  RecordId,
  /// 保存原图和 `.json` 记录
  Json,
}

impl RecordMode {
  fn from_query(value: &str) -> Self {
    match value {
      "id" => RecordMode::RecordId,
      "json" => RecordMode::Json,
      _ => RecordMode::RecordName,
    }
  }
}

/// 文本记录，每行 `label, score, left, top, right, bottom`
fn record_lines(result: &DetectResult<ImageSpace>, label_with_name: bool) -> String {
  result
    .iter()
    .map(|item| {
      let name = if label_with_name {
        item.label.to_string()
      } else {
        item.class_id.to_string()
      };
      let [l, t, r, b] = item.bbox.to_array();
      format!(
        "{}, {:.4}, {:.2}, {:.2}, {:.2}, {:.2}",
        name, item.confidence, l, t, r, b
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  draw: Draw,
  frame_counters: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  /// `folder:///path?record=name|id|json&always`
  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mode = uri
      .query_pairs()
      .find(|(k, _)| *k == "record")
      .map(|(_, v)| RecordMode::from_query(&v))
      .unwrap_or(RecordMode::Draw);

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(uri.path(), mode).always(always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, mode: RecordMode) -> Self {
    Self {
      directory: directory.into(),
      mode,
      draw: Draw::default(),
      frame_counters: Mutex::new(0),
      always: false,
    }
  }

  /// 没有检测结果的帧也保存
  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  fn frame_id(&self) -> u16 {
    // 计数器只做文件名去重，锁中毒时沿用旧值
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn save_result(
    &self,
    path: &Path,
    frame: &RgbImage,
    result: &DetectResult<ImageSpace>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self.mode {
      RecordMode::Draw => {
        self.draw.draw_detection(frame, result).save(path)?;
      }
      RecordMode::RecordName | RecordMode::RecordId => {
        frame.save(path)?;
        let lines = record_lines(result, self.mode == RecordMode::RecordName);
        std::fs::write(path.with_extension("txt"), lines)?;
      }
      RecordMode::Json => {
        frame.save(path)?;
        let text = serde_json::to_string_pretty(&result_to_json(result))?;
        std::fs::write(path.with_extension("json"), text)?;
      }
    }

    debug!("记录帧到文件: {}", path.display());
    Ok(())
  }
}

impl Render<RgbImage, DetectResult<ImageSpace>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &RgbImage,
    result: &DetectResult<ImageSpace>,
  ) -> Result<(), Self::Error> {
    if self.always || !result.is_empty() {
      let path = self.frame_path()?;
      self.save_result(&path, frame, result)?;
    }
    Ok(())
  }
}
