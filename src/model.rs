// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 模型
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

use serde_json::{Value, json};
use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 模型输出与类别表/形状假设不一致，说明模型与类别表版本不匹配
#[derive(Error, Debug)]
pub enum ConsistencyError {
  #[error("张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  TensorLength { expected: usize, actual: usize },
  #[error("输出形状无效: {0:?}")]
  OutputShape(Vec<usize>),
  #[error("输出行数不匹配: 期望 {expected} (4 + 类别数), 实际 {actual}")]
  OutputRows { expected: usize, actual: usize },
  #[error("类别索引 {class_id} 超出类别表范围 ({len})")]
  UnknownClass { class_id: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_id: usize,
  pub label: &'static str,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
}

impl Detection {
  /// `[x1, y1, x2, y2, label, score]`
  pub fn to_json(&self) -> Value {
    let [x1, y1, x2, y2] = self.bbox;
    json!([x1, y1, x2, y2, self.label, self.score])
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn to_json(&self) -> Value {
    Value::Array(self.items.iter().map(Detection::to_json).collect())
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 按类别索引寻址的固定类别表
#[derive(Debug, Clone, Copy)]
pub struct ClassCatalog {
  labels: &'static [&'static str],
}

impl ClassCatalog {
  pub const fn new(labels: &'static [&'static str]) -> Self {
    Self { labels }
  }

  pub const fn coco() -> Self {
    Self::new(&COCO_CLASSES)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn label(&self, class_id: usize) -> Result<&'static str, ConsistencyError> {
    self
      .labels
      .get(class_id)
      .copied()
      .ok_or(ConsistencyError::UnknownClass {
        class_id,
        len: self.labels.len(),
      })
  }
}

impl Default for ClassCatalog {
  fn default() -> Self {
    Self::coco()
  }
}

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

pub mod decode;
pub mod letterbox;
pub mod nms;
pub mod unmap;

mod yolo8;
pub use self::yolo8::{DetectError, Detector, DetectorConfig, Yolo8};
