// 该文件是 Shicai （识菜） 项目的一部分。
// src/model/layout.rs - 输出张量布局
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

use crate::model::DecodeError;

/// 边界框参数占用的通道数 (x, y, w, h)
pub const BOX_CHANNELS: usize = 4;

/// 模型输出张量的布局，在解码入口处根据形状确定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// 一维分类向量，长度等于类别数
  Classification { num_classes: usize },
  /// `[C, A]`，通道优先
  FlatDetection { channels: usize, anchors: usize },
  /// `[1, C, A]`，通道优先
  BatchedDetection { channels: usize, anchors: usize },
}

impl OutputLayout {
  /// 根据形状、数据长度与标签数量确定布局
  ///
  /// 先检查维数，再检查数据长度与形状乘积是否一致，最后检查通道、锚点与批次。
  pub fn resolve(shape: &[usize], len: usize, num_labels: usize) -> Result<Self, DecodeError> {
    if !(1..=3).contains(&shape.len()) {
      return Err(DecodeError::unsupported(shape));
    }

    let expected = shape
      .iter()
      .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
      .ok_or_else(|| DecodeError::unsupported(shape))?;
    if expected != len {
      return Err(DecodeError::ShapeMismatch {
        shape: shape.to_vec(),
        expected,
        actual: len,
      });
    }

    let layout = match *shape {
      [num_classes] => {
        if num_classes == 0 || num_classes != num_labels {
          return Err(DecodeError::unsupported(shape));
        }
        OutputLayout::Classification { num_classes }
      }
      [channels, anchors] => OutputLayout::FlatDetection { channels, anchors },
      [1, channels, anchors] => OutputLayout::BatchedDetection { channels, anchors },
      _ => return Err(DecodeError::unsupported(shape)),
    };

    if let Some((channels, anchors)) = layout.detection_dims() {
      if channels <= BOX_CHANNELS || anchors == 0 {
        return Err(DecodeError::unsupported(shape));
      }
    }

    Ok(layout)
  }

  /// 检测布局的 (通道数, 锚点数)，分类布局返回 None
  pub fn detection_dims(&self) -> Option<(usize, usize)> {
    match *self {
      OutputLayout::Classification { .. } => None,
      OutputLayout::FlatDetection { channels, anchors }
      | OutputLayout::BatchedDetection { channels, anchors } => Some((channels, anchors)),
    }
  }

  /// 模型输出的类别数
  pub fn num_classes(&self) -> usize {
    match *self {
      OutputLayout::Classification { num_classes } => num_classes,
      OutputLayout::FlatDetection { channels, .. }
      | OutputLayout::BatchedDetection { channels, .. } => channels - BOX_CHANNELS,
    }
  }
}
