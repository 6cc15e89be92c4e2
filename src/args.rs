// 该文件是 Kanjian （看见） 项目的一部分。
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

use clap::Parser;
use url::Url;

/// Kanjian 项目参数配置
///
/// 硬件加速由环境变量 `USE_CUDA=true` / `USE_COREML=true` 开启
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径，例如 onnx:///models/yolov8m.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入图像，例如 image:///data/bus.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - json:- 打印到标准输出
  /// - json:///path/result.json
  /// - image:///path/annotated.png
  #[arg(long, value_name = "OUTPUT", default_value = "json:-")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 忽略类别进行 NMS
  #[arg(long)]
  pub agnostic: bool,

  /// ONNX Runtime 线程数
  #[arg(long, value_name = "COUNT")]
  pub threads: Option<usize>,

  /// 重复推理次数，用于测量平均耗时
  #[arg(long, value_name = "COUNT")]
  pub repeat: Option<usize>,
}
