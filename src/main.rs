// 该文件是 Kanjian （看见） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kanjian::{
  FromUrl,
  input::ImageFileInput,
  model::{ClassCatalog, Detector, DetectorConfig, Yolo8, nms::SuppressMode},
  output::OutputWrapper,
  session::{OnnxBuilder, SessionConfig, SessionManager},
  task::{OneShotTask, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.nms_threshold);

  let input = ImageFileInput::from_url(&args.input)
    .with_context(|| format!("无法读取输入图像: {}", args.input))?;
  let output = OutputWrapper::from_url(&args.output)
    .with_context(|| format!("无法创建输出: {}", args.output))?;

  let mut session_config = SessionConfig::from_env();
  if let Some(threads) = args.threads {
    session_config = session_config.with_intra_threads(threads);
  }
  let builder = OnnxBuilder::from_url(&args.model)
    .with_context(|| format!("无效的模型路径: {}", args.model))?;
  let session = SessionManager::new(builder, session_config);

  let suppress_mode = if args.agnostic {
    SuppressMode::ClassAgnostic
  } else {
    SuppressMode::PerClass
  };
  let config = DetectorConfig::default()
    .conf_threshold(args.confidence)
    .iou_threshold(args.nms_threshold)
    .suppress_mode(suppress_mode);
  let model = Yolo8::new(Detector::new(config, ClassCatalog::coco()), session);

  let elapsed = match args.repeat {
    Some(times) => RepeatShotTask::new(times).run_task(input, model, output)?,
    None => OneShotTask.run_task(input, model, output)?,
  };
  info!("TOOK {:.2?}", elapsed);

  Ok(())
}
