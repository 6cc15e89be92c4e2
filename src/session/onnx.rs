// 该文件是 Kanjian （看见） 项目的一部分。
// src/session/onnx.rs - ONNX Runtime 推理后端
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

use ort::{
  execution_providers::{CUDAExecutionProvider, CoreMLExecutionProvider},
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ModelInput, RawOutput},
  model::ConsistencyError,
  session::{Backend, BackendBuilder, SessionConfig},
};

#[derive(Error, Debug)]
pub enum OnnxError {
  #[error("ONNX Runtime 错误: {0}")]
  Ort(String),
  #[error("模型路径错误: {0}")]
  ModelPath(String),
  #[error("模型输出不一致: {0}")]
  Consistency(#[from] ConsistencyError),
}

impl OnnxError {
  fn ort(err: impl std::fmt::Display) -> Self {
    OnnxError::Ort(err.to_string())
  }
}

/// 从 `onnx:///path/to/model.onnx` 创建 ONNX Runtime 会话
pub struct OnnxBuilder {
  model_path: PathBuf,
}

impl FromUrlWithScheme for OnnxBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxBuilder {
  type Error = OnnxError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxError::ModelPath(format!(
        "模型路径必须使用 {} 方案，实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(OnnxBuilder {
      model_path: PathBuf::from(url.path()),
    })
  }
}

impl BackendBuilder for OnnxBuilder {
  type Backend = OnnxBackend;
  type Error = OnnxError;

  fn build(&self, config: &SessionConfig) -> Result<Self::Backend, Self::Error> {
    info!("加载模型文件: {}", self.model_path.display());
    if !self.model_path.exists() {
      error!("模型文件不存在: {}", self.model_path.display());
      return Err(OnnxError::ModelPath(format!(
        "模型文件不存在: {}",
        self.model_path.display()
      )));
    }

    let mut builder = Session::builder()
      .map_err(OnnxError::ort)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(OnnxError::ort)?;

    if let Some(threads) = config.intra_threads {
      builder = builder.with_intra_threads(threads).map_err(OnnxError::ort)?;
    }

    // 加速后端不可用时直接报错，不回退到 CPU
    if config.use_cuda {
      info!("启用 CUDA 执行后端");
      builder = builder
        .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
        .map_err(OnnxError::ort)?;
    }
    if config.use_coreml {
      info!("启用 CoreML 执行后端");
      builder = builder
        .with_execution_providers([CoreMLExecutionProvider::default().build().error_on_failure()])
        .map_err(OnnxError::ort)?;
    }

    let session = builder
      .commit_from_file(&self.model_path)
      .map_err(OnnxError::ort)?;
    info!("模型加载完成");

    Ok(OnnxBackend { session })
  }
}

pub struct OnnxBackend {
  session: Session,
}

impl Backend for OnnxBackend {
  type Error = OnnxError;

  fn run(&mut self, input: &ModelInput) -> Result<RawOutput, Self::Error> {
    let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
    let tensor = Value::from_array((shape, input.as_slice().to_vec())).map_err(OnnxError::ort)?;

    let outputs = self
      .session
      .run(ort::inputs![tensor])
      .map_err(OnnxError::ort)?;
    let (shape, data) = outputs[0]
      .try_extract_tensor::<f32>()
      .map_err(OnnxError::ort)?;

    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!("模型输出形状: {:?}", dims);

    Ok(RawOutput::from_shape(&dims, data.to_vec())?)
  }
}
