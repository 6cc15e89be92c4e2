// 该文件是 Kanjian （看见） 项目的一部分。
// tests/pipeline.rs - 检测流程集成测试
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
  fmt,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use image::{Rgb, RgbImage};
use kanjian::{
  frame::{ModelInput, RawOutput},
  model::{
    ClassCatalog, ConsistencyError, DetectError, Detector, DetectorConfig, Model, Yolo8,
    letterbox::LETTERBOX_FILL, nms::iou,
  },
  session::{Backend, BackendBuilder, SessionConfig, SessionError, SessionManager},
};

const ROWS: usize = 84;

#[derive(Debug)]
struct ScriptError(String);

impl fmt::Display for ScriptError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::error::Error for ScriptError {}

/// 返回预先设定的输出，并记录收到的输入
struct ScriptedBackend {
  rows: usize,
  columns: Vec<(f32, f32, f32, f32, usize, f32)>,
  seen: Arc<Mutex<Vec<ModelInput>>>,
}

impl Backend for ScriptedBackend {
  type Error = ScriptError;

  fn run(&mut self, input: &ModelInput) -> Result<RawOutput, Self::Error> {
    self
      .seen
      .lock()
      .map_err(|e| ScriptError(e.to_string()))?
      .push(input.clone());

    let cols = self.columns.len();
    let mut data = vec![0.0; self.rows * cols];
    for (i, &(cx, cy, w, h, class_id, score)) in self.columns.iter().enumerate() {
      data[i] = cx;
      data[cols + i] = cy;
      data[2 * cols + i] = w;
      data[3 * cols + i] = h;
      if 4 + class_id < self.rows {
        data[(4 + class_id) * cols + i] = score;
      }
    }
    RawOutput::new(self.rows, cols, data).map_err(|e| ScriptError(e.to_string()))
  }
}

struct ScriptedBuilder {
  rows: usize,
  columns: Vec<(f32, f32, f32, f32, usize, f32)>,
  builds: Arc<AtomicUsize>,
  seen: Arc<Mutex<Vec<ModelInput>>>,
  fail: bool,
}

impl ScriptedBuilder {
  fn new(columns: Vec<(f32, f32, f32, f32, usize, f32)>) -> Self {
    Self {
      rows: ROWS,
      columns,
      builds: Arc::new(AtomicUsize::new(0)),
      seen: Arc::new(Mutex::new(Vec::new())),
      fail: false,
    }
  }
}

impl BackendBuilder for ScriptedBuilder {
  type Backend = ScriptedBackend;
  type Error = ScriptError;

  fn build(&self, _config: &SessionConfig) -> Result<Self::Backend, Self::Error> {
    self.builds.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(ScriptError("模型文件不存在".to_string()));
    }
    Ok(ScriptedBackend {
      rows: self.rows,
      columns: self.columns.clone(),
      seen: self.seen.clone(),
    })
  }
}

fn manager(builder: ScriptedBuilder) -> SessionManager<ScriptedBuilder> {
  SessionManager::new(builder, SessionConfig::default())
}

#[test]
fn single_candidate_maps_back_to_original_image() {
  let builder = ScriptedBuilder::new(vec![(320.0, 320.0, 100.0, 100.0, 0, 0.9)]);
  let seen = builder.seen.clone();
  let session = manager(builder);
  let image = RgbImage::from_pixel(1280, 720, Rgb([255, 0, 0]));

  let result = Detector::default().detect(&session, &image).unwrap();

  assert_eq!(result.len(), 1);
  let detection = &result.items[0];
  assert_eq!(detection.label, "person");
  assert_eq!(detection.score, 0.9);
  // scale = 0.5, pad = (0, 140)
  assert_eq!(detection.bbox, [540.0, 260.0, 740.0, 460.0]);

  // 画布：上下填充区为背景色，中间为缩放后的原图
  let inputs = seen.lock().unwrap();
  let input = &inputs[0];
  let fill = LETTERBOX_FILL as f32 / 255.0;
  assert_eq!(input.get(0, 320, 10), Some(fill));
  assert_eq!(input.get(0, 320, 630), Some(fill));
  assert_eq!(input.get(0, 320, 320), Some(1.0));
  assert_eq!(input.get(1, 320, 320), Some(0.0));
  assert_eq!(input.get(2, 320, 320), Some(0.0));
}

#[test]
fn overlapping_same_class_keeps_best() {
  // 两个框 IoU = 0.6
  let session = manager(ScriptedBuilder::new(vec![
    (320.0, 318.0, 100.0, 60.0, 2, 0.7),
    (320.0, 320.0, 100.0, 100.0, 2, 0.9),
  ]));
  let image = RgbImage::new(640, 640);

  let result = Detector::default().detect(&session, &image).unwrap();
  assert_eq!(result.len(), 1);
  assert_eq!(result.items[0].score, 0.9);
  assert_eq!(result.items[0].label, "car");
}

#[test]
fn overlapping_different_classes_both_survive() {
  let session = manager(ScriptedBuilder::new(vec![
    (320.0, 320.0, 100.0, 100.0, 0, 0.9),
    (325.0, 320.0, 100.0, 100.0, 16, 0.8),
  ]));
  let image = RgbImage::new(640, 640);

  let result = Detector::default().detect(&session, &image).unwrap();
  let labels: Vec<&str> = result.iter().map(|d| d.label).collect();
  assert_eq!(labels, vec!["person", "dog"]);
}

#[test]
fn nothing_above_threshold_is_empty_not_error() {
  let session = manager(ScriptedBuilder::new(vec![
    (320.0, 320.0, 100.0, 100.0, 0, 0.2),
    (100.0, 100.0, 50.0, 50.0, 5, 0.49),
  ]));
  let image = RgbImage::new(800, 600);

  let result = Detector::default().detect(&session, &image).unwrap();
  assert!(result.is_empty());
}

#[test]
fn survivors_respect_threshold_and_overlap() {
  let mut state = 7u32;
  let mut next = move || {
    state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    ((state >> 8) & 0xffff) as f32 / 65_535.0
  };
  // 1000x500 的原图在画布上占据 x: [0, 640], y: [160, 480]，候选框都落在其中
  let columns: Vec<_> = (0..500)
    .map(|_| {
      (
        60.0 + next() * 520.0,
        220.0 + next() * 200.0,
        10.0 + next() * 100.0,
        10.0 + next() * 100.0,
        (next() * 5.0) as usize,
        next(),
      )
    })
    .collect();
  let session = manager(ScriptedBuilder::new(columns));
  let image = RgbImage::new(1000, 500);

  let result = Detector::default().detect(&session, &image).unwrap();
  assert!(!result.is_empty());

  for (i, a) in result.items.iter().enumerate() {
    assert!(a.score >= 0.5);
    if i > 0 {
      assert!(result.items[i - 1].score >= a.score);
    }
    for b in result.items.iter().skip(i + 1) {
      if a.label == b.label {
        let overlap = iou(&a.bbox, &b.bbox);
        assert!(overlap <= 0.45 + 1e-3, "{:?} vs {:?}: {}", a, b, overlap);
      }
    }
  }
}

#[test]
fn boxes_in_padding_are_clamped() {
  let session = manager(ScriptedBuilder::new(vec![
    (5.0, 150.0, 100.0, 60.0, 0, 0.9),
    (630.0, 490.0, 80.0, 80.0, 1, 0.8),
  ]));
  let (width, height) = (1280u32, 720u32);
  let image = RgbImage::new(width, height);

  let result = Detector::default().detect(&session, &image).unwrap();
  assert_eq!(result.len(), 2);
  for detection in result.iter() {
    let [x1, y1, x2, y2] = detection.bbox;
    for x in [x1, x2] {
      assert!((0.0..=width as f32).contains(&x));
    }
    for y in [y1, y2] {
      assert!((0.0..=height as f32).contains(&y));
    }
  }
  assert_eq!(result.items[0].bbox[0], 0.0);
  assert_eq!(result.items[0].bbox[1], 0.0);
  assert_eq!(result.items[1].bbox[2], width as f32);
  assert_eq!(result.items[1].bbox[3], height as f32);
}

#[test]
fn session_is_reused_across_calls() {
  let builder = ScriptedBuilder::new(vec![(320.0, 320.0, 100.0, 100.0, 0, 0.9)]);
  let builds = builder.builds.clone();
  let model = Yolo8::new(Detector::default(), manager(builder));

  assert!(!model.session().is_initialized());
  for _ in 0..3 {
    let result = model.infer(&RgbImage::new(640, 480)).unwrap();
    assert_eq!(result.len(), 1);
  }
  assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_image_never_reaches_inference() {
  let builder = ScriptedBuilder::new(vec![]);
  let builds = builder.builds.clone();
  let session = manager(builder);

  let err = Detector::default()
    .detect(&session, &RgbImage::new(0, 0))
    .unwrap_err();
  assert!(matches!(err, DetectError::Input(_)));
  assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[test]
fn backend_failure_is_propagated() {
  let mut builder = ScriptedBuilder::new(vec![]);
  builder.fail = true;
  let session = manager(builder);

  let err = Detector::default()
    .detect(&session, &RgbImage::new(10, 10))
    .unwrap_err();
  assert!(matches!(
    err,
    DetectError::Inference(SessionError::Provision(_))
  ));

  // 每一层只出现一次
  let chain = format!("{:#}", anyhow::Error::from(err));
  assert_eq!(chain, "推理错误: 推理会话创建失败: 模型文件不存在");
}

#[test]
fn model_catalog_skew_is_a_consistency_error() {
  let mut builder = ScriptedBuilder::new(vec![(320.0, 320.0, 100.0, 100.0, 0, 0.9)]);
  builder.rows = 4 + 20;
  let session = manager(builder);

  let err = Detector::default()
    .detect(&session, &RgbImage::new(640, 640))
    .unwrap_err();
  assert!(matches!(
    err,
    DetectError::Consistency(ConsistencyError::OutputRows {
      expected: 84,
      actual: 24
    })
  ));

  // 类别表比模型小
  let detector = Detector::new(DetectorConfig::default(), ClassCatalog::new(&["person"]));
  let session = manager(ScriptedBuilder::new(vec![]));
  assert!(matches!(
    detector.detect(&session, &RgbImage::new(64, 64)),
    Err(DetectError::Consistency(_))
  ));
}
