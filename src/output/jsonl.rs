// 该文件是 Mingmu （明目） 项目的一部分。
// src/output/jsonl.rs - JSON Lines 结果日志
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
  fs::OpenOptions,
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use chrono::{SecondsFormat, Utc};
use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, ImageSpace},
  output::{Render, result_to_json},
};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("写入器锁已失效")]
  Poisoned,
}

struct Sink {
  writer: Box<dyn Write + Send>,
  frame_index: u64,
}

/// 每个检测周期输出一行 JSON
///
/// `jsonl:-` 写到标准输出，`jsonl:///path/to/file.jsonl` 追加写入文件。
pub struct JsonLinesOutput {
  sink: Mutex<Sink>,
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonLinesOutputError::SchemeMismatch(url.scheme().to_string()));
    }

    match url.path() {
      "" | "-" => Ok(Self::stdout()),
      path => Self::append_to(path),
    }
  }
}

impl JsonLinesOutput {
  pub fn stdout() -> Self {
    Self::from_writer(std::io::stdout())
  }

  pub fn append_to<P: AsRef<Path>>(path: P) -> Result<Self, JsonLinesOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    info!("检测结果写入: {}", path.display());
    Ok(Self::from_writer(BufWriter::new(file)))
  }

  pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
    Self {
      sink: Mutex::new(Sink {
        writer: Box::new(writer),
        frame_index: 0,
      }),
    }
  }
}

impl Render<RgbImage, DetectResult<ImageSpace>> for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_result(
    &self,
    frame: &RgbImage,
    result: &DetectResult<ImageSpace>,
  ) -> Result<(), Self::Error> {
    let mut sink = self
      .sink
      .lock()
      .map_err(|_| JsonLinesOutputError::Poisoned)?;

    let record = json!({
      "frame": sink.frame_index,
      "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      "width": frame.width(),
      "height": frame.height(),
      "detections": result_to_json(result),
    });
    sink.frame_index += 1;

    serde_json::to_writer(&mut sink.writer, &record)?;
    sink.writer.write_all(b"\n")?;
    sink.writer.flush()?;
    Ok(())
  }
}
