// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/json_output.rs - JSON 检测结果输出
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
  io::Write,
  path::{Path, PathBuf},
};

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::DetectResult, output::Render};

#[derive(Error, Debug)]
pub enum JsonOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 以 `[[x1, y1, x2, y2, label, score], ...]` 格式输出检测结果
///
/// `json:-` 写到标准输出，`json:///path/result.json` 写到文件
pub enum JsonOutput {
  Stdout,
  File(PathBuf),
}

impl FromUrlWithScheme for JsonOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonOutput {
  type Error = JsonOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    match url.path() {
      "" | "-" => Ok(JsonOutput::Stdout),
      path => Ok(JsonOutput::File(PathBuf::from(path))),
    }
  }
}

impl JsonOutput {
  fn write_file(path: &Path, text: &str) -> Result<(), JsonOutputError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    info!("保存检测结果到文件: {}", path.display());
    Ok(())
  }
}

impl Render<RgbImage, DetectResult> for JsonOutput {
  type Error = JsonOutputError;

  fn render_result(&self, _frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    let text = serde_json::to_string_pretty(&result.to_json())?;
    match self {
      JsonOutput::Stdout => {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", text)?;
      }
      JsonOutput::File(path) => Self::write_file(path, &text)?,
    }
    Ok(())
  }
}
