// 该文件是 Shicai （识菜） 项目的一部分。
// src/model/decode.rs - 输出张量解码
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

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
  BoundingBox, Detection, ImageSize, LetterboxTransform, OutputLayout, layout::BOX_CHANNELS,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("输出长度与形状不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际为 {actual}")]
  ShapeMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
  #[error("不支持的输出形状: {0:?}")]
  UnsupportedOutputShape(Vec<usize>),
  #[error("类别数与标签数不一致: 模型输出 {classes} 类, 标签表 {labels} 项")]
  LabelCountMismatch { classes: usize, labels: usize },
  #[error("原图尺寸无效: {width}x{height}")]
  InvalidImageSize { width: u32, height: u32 },
  #[error("信箱变换无效: 缩放 {scale}, 偏移 ({offset_x}, {offset_y})")]
  InvalidTransform {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
  },
}

impl DecodeError {
  pub fn unsupported(shape: &[usize]) -> Self {
    DecodeError::UnsupportedOutputShape(shape.to_vec())
  }
}

/// 推理运行时返回的原始输出：扁平的 f32 缓冲区及其形状
#[derive(Debug, Clone, Copy)]
pub struct RawOutput<'a> {
  pub data: &'a [f32],
  pub shape: &'a [usize],
}

impl<'a> RawOutput<'a> {
  pub fn new(data: &'a [f32], shape: &'a [usize]) -> Self {
    Self { data, shape }
  }

  pub fn layout(&self, num_labels: usize) -> Result<OutputLayout, DecodeError> {
    OutputLayout::resolve(self.shape, self.data.len(), num_labels)
  }
}

/// 找到最大值及其索引，相同最大值取第一个
fn argmax(values: impl Iterator<Item = f32>) -> Option<(f32, usize)> {
  let mut best: Option<(f32, usize)> = None;
  for (idx, value) in values.enumerate() {
    if value.is_nan() {
      continue;
    }
    match best {
      Some((max, _)) if value <= max => {}
      _ => best = Some((value, idx)),
    }
  }
  best
}

/// 将模型原始输出解码为候选检测结果（尚未做 NMS）
///
/// 只保留最大类别概率严格大于 `score_threshold` 的锚点。检测布局下的框坐标
/// 通过 `transform` 映射回原图；分类布局下唯一的候选框覆盖整张原图。
///
/// 类别名称按 `labels[class_id % labels.len()]` 取得。类别数与标签数不一致时
/// 只记录警告并继续，这会掩盖上游模型与标签表不匹配的问题；需要硬错误时使用
/// 开启了 `strict_labels` 的 [`Decoder`](crate::model::Decoder)。
pub fn decode<L: AsRef<str>>(
  output: &RawOutput<'_>,
  transform: &LetterboxTransform,
  original: ImageSize,
  labels: &[L],
  score_threshold: f32,
) -> Result<Vec<Detection>, DecodeError> {
  let layout = output.layout(labels.len())?;
  if !transform.is_valid() {
    return Err(DecodeError::InvalidTransform {
      scale: transform.scale,
      offset_x: transform.offset_x,
      offset_y: transform.offset_y,
    });
  }
  let num_classes = layout.num_classes();

  if labels.is_empty() {
    return Err(DecodeError::LabelCountMismatch {
      classes: num_classes,
      labels: 0,
    });
  }
  if num_classes != labels.len() {
    warn!(
      "模型输出 {} 类, 标签表有 {} 项, 类别名称将按取模方式选择",
      num_classes,
      labels.len()
    );
  }

  let label_of = |class_id: usize| labels[class_id % labels.len()].as_ref().to_string();

  let candidates = match layout {
    OutputLayout::Classification { .. } => {
      let mut candidates = Vec::with_capacity(1);
      if let Some((confidence, class_id)) = argmax(output.data.iter().copied()) {
        if confidence > score_threshold {
          candidates.push(Detection {
            bbox: BoundingBox::new(0.0, 0.0, original.width as f32, original.height as f32),
            class_id,
            class_name: label_of(class_id),
            confidence,
          });
        }
      }
      candidates
    }
    OutputLayout::FlatDetection { channels, anchors }
    | OutputLayout::BatchedDetection { channels, anchors } => {
      let data = output.data;
      let at = |channel: usize, anchor: usize| data[channel * anchors + anchor];
      let mut candidates = Vec::new();

      for anchor in 0..anchors {
        let scores = (BOX_CHANNELS..channels).map(|c| at(c, anchor));
        let Some((confidence, class_id)) = argmax(scores) else {
          continue;
        };
        if confidence > score_threshold {
          let bbox = transform.to_original(
            at(0, anchor),
            at(1, anchor),
            at(2, anchor),
            at(3, anchor),
          );
          candidates.push(Detection {
            bbox,
            class_id,
            class_name: label_of(class_id),
            confidence,
          });
        }
      }
      candidates
    }
  };

  debug!(
    "布局 {:?}, 阈值 {}, 得到 {} 个候选",
    layout,
    score_threshold,
    candidates.len()
  );

  Ok(candidates)
}
