// 该文件是 Shicai （识菜） 项目的一部分。
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

use tracing::debug;

use crate::model::Detection;

/// 贪心非极大值抑制，与类别无关
///
/// 按置信度降序稳定排序（置信度相同时保持原有顺序），依次接受剩余候选中
/// 置信度最高者，并移除与其 IoU 严格大于 `iou_threshold` 的候选。
/// 返回结果按置信度降序排列。
pub fn suppress(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let total = candidates.len();
  let mut suppressed = vec![false; total];

  for i in 0..total {
    if suppressed[i] {
      continue;
    }
    for j in (i + 1)..total {
      if !suppressed[j] && candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  let kept: Vec<Detection> = candidates
    .into_iter()
    .zip(suppressed)
    .filter_map(|(det, gone)| (!gone).then_some(det))
    .collect();

  debug!("NMS: {} 个候选保留 {} 个", total, kept.len());
  kept
}
