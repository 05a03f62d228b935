// 该文件是 Shicai （识菜） 项目的一部分。
// src/frame.rs - 信箱化的 NCHW 输入张量
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

use crate::model::{ImageSize, LetterboxTransform};

const RGB_CHANNELS: usize = 3;

/// 边长为 `size` 的正方形 RGB 张量，通道优先，取值归一化到 [0, 1]
///
/// 同时记录生成它时使用的信箱变换和原图尺寸，解码时原样交给解码器。
#[derive(Debug, Clone)]
pub struct LetterboxedFrame {
  data: Box<[f32]>,
  size: usize,
  transform: LetterboxTransform,
  original: ImageSize,
}

impl LetterboxedFrame {
  /// 以填充值 `fill` 初始化全部像素
  pub fn filled(size: usize, fill: f32, transform: LetterboxTransform, original: ImageSize) -> Self {
    let data = vec![fill; RGB_CHANNELS * size * size].into_boxed_slice();
    Self {
      data,
      size,
      transform,
      original,
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 模型输入形状 `[1, 3, size, size]`
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size, self.size]
  }

  pub fn transform(&self) -> &LetterboxTransform {
    &self.transform
  }

  pub fn original(&self) -> ImageSize {
    self.original
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
    self.data[c * self.size * self.size + y * self.size + x]
  }

  pub fn set(&mut self, c: usize, y: usize, x: usize, value: f32) {
    self.data[c * self.size * self.size + y * self.size + x] = value;
  }
}
