// 该文件是 Mingmu （明目） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use url::Url;

use crate::model::{
  DEFAULT_INPUT_SIZE, DetectorBuilder, DetectorConfig,
  decode::DEFAULT_CONFIDENCE_THRESHOLD,
  nms::{DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_RESULTS},
};

/// 检测程序的公共参数，各个可执行文件通过 `#[command(flatten)]` 引入
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
  /// 模型地址，如 onnx:///path/to/yolov5s.onnx?threads=4
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 图片: image:///path/to/image.jpg
  /// - 目录: folder:///path/to/images
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 图片: image:///path/to/out.png
  /// - 目录记录: folder:///path/to/records?record=name|id|json&always
  /// - JSON Lines: jsonl:///path/to/log.jsonl 或 jsonl:-
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 标签文件，每行一个类别名称；缺省使用内置 COCO 标签
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 模型输入边长
  #[arg(long, default_value_t = DEFAULT_INPUT_SIZE, value_name = "PIXELS")]
  pub input_size: u32,

  /// 类别置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 目标性阈值 (0.0 - 1.0)，缺省与置信度阈值相同
  #[arg(long, value_name = "THRESHOLD")]
  pub objectness: Option<f32>,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 每帧最多保留的检测数
  #[arg(long, default_value_t = DEFAULT_MAX_RESULTS, value_name = "COUNT")]
  pub max_results: usize,

  /// 标签文字使用的字体文件 (TTF/OTF)；缺省使用内置字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

impl DetectArgs {
  pub fn to_config(&self) -> DetectorConfig {
    DetectorConfig {
      input_size: self.input_size,
      objectness_threshold: self.objectness.unwrap_or(self.confidence),
      confidence_threshold: self.confidence,
      iou_threshold: self.iou_threshold,
      max_results: self.max_results,
    }
  }

  pub fn detector_builder(&self) -> DetectorBuilder {
    info!("模型地址: {}", self.model);
    info!("输入来源: {}", self.input);
    info!("输出路径: {}", self.output);

    let builder = DetectorBuilder::new().config(self.to_config());
    match &self.labels {
      Some(path) => {
        info!("标签文件: {}", path.display());
        builder.labels_file(path)
      }
      None => builder,
    }
  }

  #[cfg(feature = "draw")]
  pub fn draw(&self) -> Result<crate::output::draw::Draw, crate::output::draw::DrawError> {
    let draw = crate::output::draw::Draw::default();
    match &self.font {
      Some(path) => draw.with_font_file(path),
      None => Ok(draw),
    }
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(flatten)]
    detect: DetectArgs,
  }

  const REQUIRED: [&str; 7] = [
    "mingmu",
    "--model",
    "onnx:///m.onnx",
    "--input",
    "image:///in.jpg",
    "--output",
    "image:///out.png",
  ];

  #[test]
  fn defaults_match_detector_config() {
    let cli = Cli::try_parse_from(REQUIRED).unwrap();
    assert_eq!(cli.detect.to_config(), DetectorConfig::default());
    assert!(cli.detect.labels.is_none());
  }

  #[test]
  fn objectness_follows_confidence_unless_given() {
    let mut argv = REQUIRED.to_vec();
    argv.extend(["--confidence", "0.5", "--max-results", "3"]);
    let config = Cli::try_parse_from(argv.clone()).unwrap().detect.to_config();
    assert_eq!(config.confidence_threshold, 0.5);
    assert_eq!(config.objectness_threshold, 0.5);
    assert_eq!(config.max_results, 3);

    argv.extend(["--objectness", "0.1"]);
    let config = Cli::try_parse_from(argv.clone()).unwrap().detect.to_config();
    assert_eq!(config.objectness_threshold, 0.1);
  }

  #[test]
  fn missing_model_is_rejected() {
    assert!(Cli::try_parse_from(["mingmu", "--input", "image:///in.jpg"]).is_err());
  }
}
