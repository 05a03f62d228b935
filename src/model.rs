// 该文件是 Shicai （识菜） 项目的一部分。
// src/model.rs - 检测结果与解码器
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

use serde::Serialize;

/// 原图像素坐标系下的边界框，左上角为原点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
  /// 边界框左上角 x 坐标
  pub x: f32,
  /// 边界框左上角 y 坐标
  pub y: f32,
  /// 边界框宽度
  pub width: f32,
  /// 边界框高度
  pub height: f32,
}

impl BoundingBox {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  /// 计算两个边界框的 IoU，不相交或并集为零时返回 0
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());

    if x2 < x1 || y2 < y1 {
      return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 单个检测结果，生成后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: BoundingBox,
  /// 类别索引
  pub class_id: usize,
  /// 类别名称
  pub class_name: String,
  /// 置信度，取值 (0, 1]
  pub confidence: f32,
}

/// 按置信度降序排列的检测结果集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

/// 展示层默认的置信度下限
pub const DISPLAY_CONFIDENCE_THRESHOLD: f32 = 0.25;

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

  /// 按类别名称去重，供展示层使用
  ///
  /// 丢弃置信度不高于 `min_confidence` 的结果；同一类别只保留置信度最高的一项，
  /// 位置沿用该类别第一次出现的位置。解码器本身从不调用此方法。
  pub fn distinct_by_class(&self, min_confidence: f32) -> DetectResult {
    let mut unique: Vec<Detection> = Vec::new();

    for item in self.items.iter().filter(|d| d.confidence > min_confidence) {
      match unique.iter_mut().find(|u| u.class_name == item.class_name) {
        None => unique.push(item.clone()),
        Some(existing) if item.confidence > existing.confidence => *existing = item.clone(),
        Some(_) => {}
      }
    }

    DetectResult {
      items: unique.into_boxed_slice(),
    }
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<'a> IntoIterator for &'a DetectResult {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

mod decode;
mod decoder;
mod layout;
mod letterbox;
mod nms;

pub use self::decode::{DecodeError, RawOutput, decode};
pub use self::decoder::{ConfigError, Decoder, DecoderBuilder};
pub use self::layout::OutputLayout;
pub use self::letterbox::{ImageSize, LetterboxTransform};
pub use self::nms::suppress;

#[cfg(test)]
mod tests {
  use super::*;

  fn det(class_name: &str, confidence: f32) -> Detection {
    Detection {
      bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      class_id: 0,
      class_name: class_name.to_string(),
      confidence,
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
    assert!((a.iou(&a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(20.0, 20.0, 10.0, 10.0);
    assert_eq!(a.iou(&b), 0.0);
    assert_eq!(b.iou(&a), 0.0);
  }

  #[test]
  fn iou_of_touching_boxes_is_zero() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(10.0, 0.0, 10.0, 10.0);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_of_half_overlap() {
    // 交集 50，并集 150
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
    assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_degenerate_boxes_is_zero() {
    let a = BoundingBox::new(5.0, 5.0, 0.0, 0.0);
    assert_eq!(a.iou(&a), 0.0);
  }

  #[test]
  fn distinct_by_class_keeps_best_per_label() {
    let result = DetectResult::from(vec![
      det("당근", 0.6),
      det("양파", 0.5),
      det("당근", 0.9),
      det("감자", 0.2),
    ]);

    let distinct = result.distinct_by_class(DISPLAY_CONFIDENCE_THRESHOLD);
    let names: Vec<_> = distinct.iter().map(|d| d.class_name.as_str()).collect();
    assert_eq!(names, ["당근", "양파"]);
    assert_eq!(distinct.items[0].confidence, 0.9);
  }

  #[test]
  fn distinct_by_class_drops_threshold_boundary() {
    let result = DetectResult::from(vec![det("마늘", 0.25)]);
    assert!(result.distinct_by_class(0.25).is_empty());
  }
}
