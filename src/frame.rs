// 该文件是 Kanjian （看见） 项目的一部分。
// src/frame.rs - 模型输入/输出张量定义
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

use crate::model::ConsistencyError;

const RGB_CHANNELS: usize = 3;

/// 网络固定的正方形输入边长
pub const INPUT_SIZE: u32 = 640;

/// 送入推理后端的张量类型
pub type ModelInput = InputTensor<INPUT_SIZE>;

/// 归一化后的 RGB 张量，NCHW 布局（N = 1），取值范围 [0, 1]
#[derive(Debug, Clone)]
pub struct InputTensor<const S: u32> {
  data: Box<[f32]>,
}

impl<const S: u32> InputTensor<S> {
  pub const LEN: usize = RGB_CHANNELS * (S as usize) * (S as usize);

  /// 创建所有元素均为 `value` 的张量
  pub fn filled(value: f32) -> Self {
    Self {
      data: vec![value; Self::LEN].into_boxed_slice(),
    }
  }

  /// `[N, C, H, W]`
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, S as usize, S as usize]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  /// 读取通道 `c` 中位于 `(x, y)` 的值
  pub fn get(&self, c: usize, x: usize, y: usize) -> Option<f32> {
    let size = S as usize;
    if c >= RGB_CHANNELS || x >= size || y >= size {
      return None;
    }
    self.data.get(c * size * size + y * size + x).copied()
  }
}

impl<const S: u32> AsMut<[f32]> for InputTensor<S> {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

impl<const S: u32> TryFrom<Vec<f32>> for InputTensor<S> {
  type Error = ConsistencyError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(ConsistencyError::TensorLength {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

/// 检测网络的原始输出：`rows = 4 + num_classes` 行，`cols = num_candidates` 列，行优先存储
#[derive(Debug, Clone)]
pub struct RawOutput {
  rows: usize,
  cols: usize,
  data: Box<[f32]>,
}

impl RawOutput {
  pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, ConsistencyError> {
    if data.len() != rows * cols {
      return Err(ConsistencyError::TensorLength {
        expected: rows * cols,
        actual: data.len(),
      });
    }

    Ok(Self {
      rows,
      cols,
      data: data.into_boxed_slice(),
    })
  }

  /// 由推理后端报告的形状构造，接受 `[1, rows, cols]` 或 `[rows, cols]`
  pub fn from_shape(shape: &[usize], data: Vec<f32>) -> Result<Self, ConsistencyError> {
    match *shape {
      [1, rows, cols] | [rows, cols] => Self::new(rows, cols, data),
      _ => Err(ConsistencyError::OutputShape(shape.to_vec())),
    }
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  /// 第 `row` 行的全部候选值
  pub fn row(&self, row: usize) -> &[f32] {
    let start = row * self.cols;
    &self.data[start..start + self.cols]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn input_tensor_rejects_wrong_length() {
    let err = InputTensor::<4>::try_from(vec![0.0; 10]).unwrap_err();
    assert!(matches!(
      err,
      ConsistencyError::TensorLength {
        expected: 48,
        actual: 10
      }
    ));
  }

  #[test]
  fn input_tensor_indexes_planar_layout() {
    let mut data = vec![0.0; InputTensor::<2>::LEN];
    // 通道 1，(x=1, y=0)
    data[4 + 1] = 0.5;
    let tensor = InputTensor::<2>::try_from(data).unwrap();
    assert_eq!(tensor.get(1, 1, 0), Some(0.5));
    assert_eq!(tensor.get(3, 0, 0), None);
    assert_eq!(tensor.shape(), [1, 3, 2, 2]);
  }

  #[test]
  fn raw_output_accepts_batched_shape() {
    let output = RawOutput::from_shape(&[1, 5, 3], vec![0.0; 15]).unwrap();
    assert_eq!((output.rows(), output.cols()), (5, 3));

    let err = RawOutput::from_shape(&[2, 5, 3], vec![0.0; 30]).unwrap_err();
    assert!(matches!(err, ConsistencyError::OutputShape(_)));
  }

  #[test]
  fn raw_output_rows_are_contiguous() {
    let output = RawOutput::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(output.row(1), &[4.0, 5.0, 6.0]);
    assert!(RawOutput::new(2, 3, vec![0.0; 5]).is_err());
  }
}
