// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/letterbox.rs - 等比缩放填充预处理
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

use image::{RgbImage, imageops::FilterType};
use tracing::debug;

use crate::{frame::InputTensor, input::InputError};

/// 画布背景灰度值
pub const LETTERBOX_FILL: u8 = 114;

/// 原图到正方形画布的几何映射，用于把检测框还原到原图坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub target_size: u32,
  pub src_width: u32,
  pub src_height: u32,
  pub scaled_width: u32,
  pub scaled_height: u32,
}

impl LetterboxTransform {
  /// 计算 `width x height` 的图像放入 `target_size` 正方形画布时的缩放与填充
  pub fn new(width: u32, height: u32, target_size: u32) -> Result<Self, InputError> {
    if width == 0 || height == 0 {
      return Err(InputError::EmptyImage { width, height });
    }

    let scale = target_size as f32 / width.max(height) as f32;
    let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
    let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

    // 整数像素偏移，与画布上的实际摆放位置一致
    let pad_x = (target_size - scaled_width) / 2;
    let pad_y = (target_size - scaled_height) / 2;

    Ok(Self {
      scale,
      pad_x: pad_x as f32,
      pad_y: pad_y as f32,
      target_size,
      src_width: width,
      src_height: height,
      scaled_width,
      scaled_height,
    })
  }

  /// 原图坐标 -> 画布坐标，bbox 为 [x_min, y_min, x_max, y_max]
  pub fn forward(&self, bbox: [f32; 4]) -> [f32; 4] {
    [
      bbox[0] * self.scale + self.pad_x,
      bbox[1] * self.scale + self.pad_y,
      bbox[2] * self.scale + self.pad_x,
      bbox[3] * self.scale + self.pad_y,
    ]
  }

  /// 画布坐标 -> 原图坐标，并裁剪到原图范围内
  pub fn inverse(&self, bbox: [f32; 4]) -> [f32; 4] {
    let w = self.src_width as f32;
    let h = self.src_height as f32;
    [
      ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, h),
      ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, h),
    ]
  }
}

/// 将任意尺寸的图像等比缩放到 `S x S` 画布中心，输出归一化的 NCHW 张量
pub fn letterbox<const S: u32>(
  image: &RgbImage,
) -> Result<(InputTensor<S>, LetterboxTransform), InputError> {
  let (width, height) = image.dimensions();
  let transform = LetterboxTransform::new(width, height, S)?;
  debug!(
    "Letterbox: {}x{} -> {}x{}, 缩放 {:.4}, 填充 ({}, {})",
    width,
    height,
    transform.scaled_width,
    transform.scaled_height,
    transform.scale,
    transform.pad_x,
    transform.pad_y
  );

  // 尺寸已满足时跳过缩放
  let resized;
  let source = if (transform.scaled_width, transform.scaled_height) == (width, height) {
    image
  } else {
    resized = image::imageops::resize(
      image,
      transform.scaled_width,
      transform.scaled_height,
      FilterType::Triangle,
    );
    &resized
  };

  let mut tensor = InputTensor::<S>::filled(LETTERBOX_FILL as f32 / 255.0);
  let size = S as usize;
  let plane = size * size;
  let pad_x = transform.pad_x as usize;
  let pad_y = transform.pad_y as usize;
  let slice = tensor.as_mut();

  for (x, y, pixel) in source.enumerate_pixels() {
    let index = (y as usize + pad_y) * size + (x as usize + pad_x);
    slice[index] = pixel[0] as f32 / 255.0;
    slice[plane + index] = pixel[1] as f32 / 255.0;
    slice[2 * plane + index] = pixel[2] as f32 / 255.0;
  }

  Ok((tensor, transform))
}
