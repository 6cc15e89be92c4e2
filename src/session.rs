// 该文件是 Kanjian （看见） 项目的一部分。
// src/session.rs - 推理会话管理
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

use std::{error::Error as StdError, sync::Mutex};

use thiserror::Error;
use tracing::{debug, info};

use crate::frame::{ModelInput, RawOutput};

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxBackend, OnnxBuilder, OnnxError};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

const USE_CUDA_ENV: &str = "USE_CUDA";
const USE_COREML_ENV: &str = "USE_COREML";

/// 执行网络推理的后端，不要求可重入
pub trait Backend {
  type Error: StdError + Send + Sync + 'static;

  fn run(&mut self, input: &ModelInput) -> Result<RawOutput, Self::Error>;
}

/// 按会话配置创建推理后端
pub trait BackendBuilder {
  type Backend: Backend;
  type Error: StdError + Send + Sync + 'static;

  fn build(&self, config: &SessionConfig) -> Result<Self::Backend, Self::Error>;
}

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("推理会话创建失败")]
  Provision(#[source] BoxError),
  #[error("推理执行失败")]
  Inference(#[source] BoxError),
  #[error("推理会话锁已损坏")]
  Poisoned,
}

/// 推理会话配置，硬件加速选项在第一次推理前确定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
  pub use_cuda: bool,
  pub use_coreml: bool,
  pub intra_threads: Option<usize>,
}

impl SessionConfig {
  /// 从进程环境变量 `USE_CUDA` / `USE_COREML` 读取
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let config = Self {
      use_cuda: env_flag(lookup(USE_CUDA_ENV)),
      use_coreml: env_flag(lookup(USE_COREML_ENV)),
      intra_threads: None,
    };
    debug!("会话配置: {:?}", config);
    config
  }

  pub fn with_intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = Some(threads);
    self
  }
}

fn env_flag(value: Option<String>) -> bool {
  value
    .map(|v| {
      let v = v.trim();
      v.eq_ignore_ascii_case("true") || v == "1"
    })
    .unwrap_or(false)
}

/// 持有唯一的推理会话：首次使用时创建，之后复用，同一时刻只允许一次推理
pub struct SessionManager<B: BackendBuilder> {
  builder: B,
  config: SessionConfig,
  session: Mutex<Option<B::Backend>>,
}

impl<B: BackendBuilder> SessionManager<B> {
  pub fn new(builder: B, config: SessionConfig) -> Self {
    Self {
      builder,
      config,
      session: Mutex::new(None),
    }
  }

  /// 立即创建会话，而不是等到第一次推理
  pub fn init(&self) -> Result<(), SessionError> {
    let mut slot = self.session.lock().map_err(|_| SessionError::Poisoned)?;
    Self::ensure(&self.builder, &self.config, &mut slot)?;
    Ok(())
  }

  pub fn is_initialized(&self) -> bool {
    self
      .session
      .lock()
      .map(|slot| slot.is_some())
      .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
  }

  pub fn run(&self, input: &ModelInput) -> Result<RawOutput, SessionError> {
    let mut slot = self.session.lock().map_err(|_| SessionError::Poisoned)?;
    let backend = Self::ensure(&self.builder, &self.config, &mut slot)?;
    debug!("执行模型推理");
    backend
      .run(input)
      .map_err(|e| SessionError::Inference(Box::new(e)))
  }

  fn ensure<'a>(
    builder: &B,
    config: &SessionConfig,
    slot: &'a mut Option<B::Backend>,
  ) -> Result<&'a mut B::Backend, SessionError> {
    let backend = match slot.take() {
      Some(backend) => backend,
      None => {
        info!("创建推理会话");
        let backend = builder
          .build(config)
          .map_err(|e| SessionError::Provision(Box::new(e)))?;
        info!("推理会话创建完成");
        backend
      }
    };
    Ok(slot.insert(backend))
  }
}
