// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/decode.rs - 原始输出张量解码
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

use tracing::debug;

use crate::{frame::RawOutput, model::ConsistencyError};

const BOX_ROWS: usize = 4;

/// 模型空间（画布坐标）中的候选框，中心点形式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
  pub class_id: usize,
  pub score: f32,
}

impl Candidate {
  /// [x_min, y_min, x_max, y_max]
  pub fn bbox(&self) -> [f32; 4] {
    let half_w = self.w / 2.0;
    let half_h = self.h / 2.0;
    [
      self.cx - half_w,
      self.cy - half_h,
      self.cx + half_w,
      self.cy + half_h,
    ]
  }
}

/// 逐列解码原始输出，保留最高类别分数不低于 `conf_threshold` 的候选框
pub fn decode(
  output: &RawOutput,
  num_classes: usize,
  conf_threshold: f32,
) -> Result<Vec<Candidate>, ConsistencyError> {
  let expected = BOX_ROWS + num_classes;
  if output.rows() != expected {
    return Err(ConsistencyError::OutputRows {
      expected,
      actual: output.rows(),
    });
  }

  let num_candidates = output.cols();

  // 按行扫描类别分数，比逐列跨行读取更贴合行优先布局
  let mut best_score = vec![f32::NEG_INFINITY; num_candidates];
  let mut best_class = vec![0usize; num_candidates];
  for class_id in 0..num_classes {
    let scores = output.row(BOX_ROWS + class_id);
    for (i, &score) in scores.iter().enumerate() {
      if score > best_score[i] {
        best_score[i] = score;
        best_class[i] = class_id;
      }
    }
  }

  let (cx, cy, w, h) = (output.row(0), output.row(1), output.row(2), output.row(3));
  let candidates: Vec<Candidate> = (0..num_candidates)
    .filter(|&i| best_score[i] >= conf_threshold)
    .map(|i| Candidate {
      cx: cx[i],
      cy: cy[i],
      w: w[i],
      h: h[i],
      class_id: best_class[i],
      score: best_score[i],
    })
    .collect();

  debug!(
    "解码 {} 个候选框，{} 个高于置信度阈值 {}",
    num_candidates,
    candidates.len(),
    conf_threshold
  );

  Ok(candidates)
}
