// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::decode::Candidate;

/// 抑制范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuppressMode {
  /// 仅在同一类别内抑制
  #[default]
  PerClass,
  /// 忽略类别，所有候选框一起抑制
  ClassAgnostic,
}

/// 计算两个边界框的 IoU，bbox 为 [x_min, y_min, x_max, y_max]
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  if a[2] <= a[0] || a[3] <= a[1] || b[2] <= b[0] || b[3] <= b[1] {
    return 0.0;
  }

  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按类别分组的贪心 NMS
pub fn suppress(candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  suppress_with(candidates, iou_threshold, SuppressMode::PerClass)
}

pub fn suppress_with(
  candidates: Vec<Candidate>,
  iou_threshold: f32,
  mode: SuppressMode,
) -> Vec<Candidate> {
  let total = candidates.len();

  let mut groups: BTreeMap<usize, Vec<(usize, Candidate)>> = BTreeMap::new();
  for (index, candidate) in candidates.into_iter().enumerate() {
    let key = match mode {
      SuppressMode::PerClass => candidate.class_id,
      SuppressMode::ClassAgnostic => 0,
    };
    groups.entry(key).or_default().push((index, candidate));
  }

  let mut kept = Vec::new();
  for (_, mut group) in groups {
    // 分数降序，同分按原始顺序
    group.sort_by(|(ia, a), (ib, b)| b.score.total_cmp(&a.score).then(ia.cmp(ib)));

    let boxes: Vec<[f32; 4]> = group.iter().map(|(_, c)| c.bbox()).collect();
    let mut suppressed = vec![false; group.len()];
    for i in 0..group.len() {
      if suppressed[i] {
        continue;
      }
      kept.push(group[i].1);
      for j in (i + 1)..group.len() {
        if !suppressed[j] && iou(&boxes[i], &boxes[j]) > iou_threshold {
          suppressed[j] = true;
        }
      }
    }
  }

  debug!("NMS: {} 个候选框保留 {} 个", total, kept.len());
  kept
}
