// 该文件是 Mingmu （明目） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理基准测试
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

use anyhow::Result;
use clap::Parser;

use mingmu::{
  FromUrl,
  args::DetectArgs,
  input::InputWrapper,
  model::OnnxEngineBuilder,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};

/// Mingmu 基准测试，对同一帧重复推理并报告平均耗时
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detect: DetectArgs,

  /// 重复次数
  #[arg(long, default_value_t = 1000, value_name = "COUNT")]
  pub repeat: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let engine = OnnxEngineBuilder::from_url(&args.detect.model)?.build()?;
  let model = args.detect.detector_builder().build(engine)?;
  let input_image = InputWrapper::from_url(&args.detect.input)?;
  let output = OutputWrapper::from_url(&args.detect.output)?.with_draw(args.detect.draw()?);

  RepeatShotTask::default()
    .with_repeat_times(args.repeat)
    .run_task(input_image, model, output)?;

  Ok(())
}
