// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/yolo8.rs - YOLOv8 检测流程
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

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::{INPUT_SIZE, RawOutput},
  input::InputError,
  model::{
    ClassCatalog, ConsistencyError, DetectResult, Detection, Model,
    decode::decode,
    letterbox::{LetterboxTransform, letterbox},
    nms::{SuppressMode, suppress_with},
    unmap::unmap,
  },
  session::{BackendBuilder, SessionError, SessionManager},
};

const YOLO8_OBJECT_THRESH: f32 = 0.5;
const YOLO8_NMS_THRESH: f32 = 0.45;

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("输入错误")]
  Input(#[from] InputError),
  #[error("推理错误")]
  Inference(#[from] SessionError),
  #[error("模型与类别表不一致")]
  Consistency(#[from] ConsistencyError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  pub suppress_mode: SuppressMode,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      conf_threshold: YOLO8_OBJECT_THRESH,
      iou_threshold: YOLO8_NMS_THRESH,
      suppress_mode: SuppressMode::PerClass,
    }
  }
}

impl DetectorConfig {
  pub fn conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn suppress_mode(mut self, mode: SuppressMode) -> Self {
    self.suppress_mode = mode;
    self
  }
}

/// 预处理与后处理，推理会话由调用方持有并传入
#[derive(Debug, Clone, Default)]
pub struct Detector {
  config: DetectorConfig,
  catalog: ClassCatalog,
}

impl Detector {
  pub fn new(config: DetectorConfig, catalog: ClassCatalog) -> Self {
    Self { config, catalog }
  }

  pub fn detect<B: BackendBuilder>(
    &self,
    session: &SessionManager<B>,
    image: &RgbImage,
  ) -> Result<DetectResult, DetectError> {
    let (input, transform) = letterbox::<INPUT_SIZE>(image)?;
    let output = session.run(&input)?;
    Ok(self.postprocess(&output, &transform)?)
  }

  /// 解码、抑制并还原坐标，结果按分数降序排列
  pub fn postprocess(
    &self,
    output: &RawOutput,
    transform: &LetterboxTransform,
  ) -> Result<DetectResult, ConsistencyError> {
    debug!("后处理模型输出");
    let candidates = decode(output, self.catalog.len(), self.config.conf_threshold)?;
    let kept = suppress_with(
      candidates,
      self.config.iou_threshold,
      self.config.suppress_mode,
    );

    let mut items = kept
      .iter()
      .map(|candidate| unmap(candidate, transform, &self.catalog))
      .collect::<Result<Vec<Detection>, _>>()?;
    items.sort_by(|a, b| b.score.total_cmp(&a.score));

    debug!("检测到 {} 个物体", items.len());
    debug!("检测结果: {:?}", items);

    Ok(DetectResult::from(items))
  }
}

/// 检测器与会话的组合，实现 `Model`
pub struct Yolo8<B: BackendBuilder> {
  detector: Detector,
  session: SessionManager<B>,
}

impl<B: BackendBuilder> Yolo8<B> {
  pub fn new(detector: Detector, session: SessionManager<B>) -> Self {
    Self { detector, session }
  }

  pub fn session(&self) -> &SessionManager<B> {
    &self.session
  }
}

impl<B: BackendBuilder> Model for Yolo8<B> {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detector.detect(&self.session, input)
  }
}
