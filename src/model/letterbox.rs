// 该文件是 Shicai （识菜） 项目的一部分。
// src/model/letterbox.rs - 信箱变换
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

use crate::model::BoundingBox;

/// 原图尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
  pub width: u32,
  pub height: u32,
}

impl ImageSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

/// 原图缩放并居中填充到边长为 `input_size` 的正方形时使用的缩放与偏移
///
/// 满足 `offset_x = (input_size - width * scale) / 2`，
/// `offset_y = (input_size - height * scale) / 2`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub offset_x: f32,
  pub offset_y: f32,
}

impl Default for LetterboxTransform {
  fn default() -> Self {
    Self::identity()
  }
}

impl LetterboxTransform {
  pub fn new(scale: f32, offset_x: f32, offset_y: f32) -> Self {
    Self {
      scale,
      offset_x,
      offset_y,
    }
  }

  pub fn identity() -> Self {
    Self::new(1.0, 0.0, 0.0)
  }

  /// 计算保持宽高比的缩放与居中偏移，任一边长为 0 时返回 None
  pub fn fit(source: ImageSize, input_size: u32) -> Option<Self> {
    if source.is_empty() || input_size == 0 {
      return None;
    }

    let input = input_size as f32;
    let (w, h) = (source.width as f32, source.height as f32);
    let scale = (input / w).min(input / h);

    Some(Self {
      scale,
      offset_x: (input - w * scale) / 2.0,
      offset_y: (input - h * scale) / 2.0,
    })
  }

  /// 缩放为有限正数且偏移有限
  pub fn is_valid(&self) -> bool {
    self.scale.is_finite()
      && self.scale > 0.0
      && self.offset_x.is_finite()
      && self.offset_y.is_finite()
  }

  /// 缩放后（未填充部分）的尺寸，四舍五入到整像素
  pub fn scaled_size(&self, source: ImageSize) -> ImageSize {
    ImageSize {
      width: (source.width as f32 * self.scale).round() as u32,
      height: (source.height as f32 * self.scale).round() as u32,
    }
  }

  /// 信箱坐标系下的中心点形式 (cx, cy, w, h) 映射回原图左上角形式
  pub fn to_original(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
    let real_x = (cx - self.offset_x) / self.scale;
    let real_y = (cy - self.offset_y) / self.scale;
    let real_w = w / self.scale;
    let real_h = h / self.scale;

    BoundingBox {
      x: real_x - real_w / 2.0,
      y: real_y - real_h / 2.0,
      width: real_w,
      height: real_h,
    }
  }

  /// `to_original` 的逆映射，返回信箱坐标系下的 [cx, cy, w, h]
  pub fn to_letterboxed(&self, bbox: &BoundingBox) -> [f32; 4] {
    let w = bbox.width * self.scale;
    let h = bbox.height * self.scale;
    let cx = (bbox.x + bbox.width / 2.0) * self.scale + self.offset_x;
    let cy = (bbox.y + bbox.height / 2.0) * self.scale + self.offset_y;
    [cx, cy, w, h]
  }
}
