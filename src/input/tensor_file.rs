// 该文件是 Shicai （识菜） 项目的一部分。
// src/input/tensor_file.rs - 推理输出的 JSON 转储
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::RawOutput, url_file_path};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("路径不是有效的 UTF-8: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
}

/// 持有所有权的输出张量 `{"shape": [...], "data": [...]}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTensor {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl RawTensor {
  pub fn as_raw(&self) -> RawOutput<'_> {
    RawOutput::new(&self.data, &self.shape)
  }
}

pub struct TensorFileInput {
  tensor: Option<RawTensor>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemeMismatch);
    }

    let path = url_file_path(url)?.unwrap_or_default();
    let content = std::fs::read_to_string(&path)?;
    let tensor: RawTensor = serde_json::from_str(&content)?;
    debug!(
      "读取张量 {}: 形状 {:?}, {} 个元素",
      path.display(),
      tensor.shape,
      tensor.data.len()
    );

    Ok(TensorFileInput {
      tensor: Some(tensor),
    })
  }
}

impl Iterator for TensorFileInput {
  type Item = RawTensor;

  fn next(&mut self) -> Option<Self::Item> {
    self.tensor.take()
  }
}
