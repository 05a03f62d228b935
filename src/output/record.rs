// 该文件是 Shicai （识菜） 项目的一部分。
// src/output/record.rs - 以 JSON 记录检测结果
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

use std::{io::Write, path::PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{BoundingBox, DISPLAY_CONFIDENCE_THRESHOLD, DetectResult},
  output::Render,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数 {0} 无效: {1}")]
  InvalidParameter(String, String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("路径不是有效的 UTF-8: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
}

#[derive(Serialize)]
struct RecordItem<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  class_name: Option<&'a str>,
  class_id: usize,
  confidence: f32,
  bbox: &'a BoundingBox,
}

/// `record:///out.json?distinct&min=0.25&id`
///
/// 路径为空时写到标准输出。`distinct` 按类别去重，`min` 为去重时的置信度下限，
/// `id` 只记录类别索引。
pub struct RecordOutput {
  path: Option<PathBuf>,
  distinct: Option<f32>,
  label_with_name: bool,
}

impl Default for RecordOutput {
  fn default() -> Self {
    Self {
      path: None,
      distinct: None,
      label_with_name: true,
    }
  }
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RecordOutputError::SchemeMismatch);
    }

    let mut output = RecordOutput {
      path: url_file_path(url)?,
      ..Default::default()
    };
    let mut min = DISPLAY_CONFIDENCE_THRESHOLD;
    let mut distinct = false;

    for (k, v) in url.query_pairs() {
      match &*k {
        "distinct" => distinct = true,
        "min" => {
          min = v
            .parse()
            .map_err(|_| RecordOutputError::InvalidParameter(k.to_string(), v.to_string()))?
        }
        "id" => output.label_with_name = false,
        _ => {
          return Err(RecordOutputError::InvalidParameter(
            k.to_string(),
            v.to_string(),
          ));
        }
      }
    }

    output.distinct = distinct.then_some(min);
    Ok(output)
  }
}

impl RecordOutput {
  fn to_json(&self, result: &DetectResult) -> Result<String, serde_json::Error> {
    let distinct;
    let result = match self.distinct {
      Some(min) => {
        distinct = result.distinct_by_class(min);
        &distinct
      }
      None => result,
    };

    let items: Vec<RecordItem> = result
      .iter()
      .map(|d| RecordItem {
        class_name: self.label_with_name.then_some(d.class_name.as_str()),
        class_id: d.class_id,
        confidence: d.confidence,
        bbox: &d.bbox,
      })
      .collect();

    serde_json::to_string_pretty(&items)
  }
}

impl Render<DetectResult> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(&self, result: &DetectResult) -> Result<(), Self::Error> {
    let json = self.to_json(result)?;
    match &self.path {
      Some(path) => {
        std::fs::write(path, json)?;
        info!("检测结果已写入 {}", path.display());
      }
      None => {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", json)?;
      }
    }
    Ok(())
  }
}
