// 该文件是 Shicai （识菜） 项目的一部分。
// src/label.rs - 类别标签表
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

use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// 蔬菜分类模型的类别名称，顺序与训练时一致
pub const VEGETABLE_LABELS: [&str; 20] = [
  "양파",
  "파",
  "마늘",
  "당근",
  "고추",
  "양배추",
  "두부",
  "콩나물",
  "돼지고기",
  "소고기",
  "닭고기",
  "김치",
  "새우",
  "갈치",
  "계란",
  "감자",
  "고구마",
  "느타리버섯",
  "양송이버섯",
  "새송이버섯",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标签表为空")]
  Empty,
}

/// 按模型训练顺序排列的类别名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  names: Box<[String]>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::vegetables()
  }
}

impl LabelTable {
  pub fn new<I, S>(names: I) -> Result<Self, LabelError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names: Box<[String]> = names.into_iter().map(Into::into).collect();
    if names.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self { names })
  }

  pub fn vegetables() -> Self {
    Self {
      names: VEGETABLE_LABELS.iter().map(|s| s.to_string()).collect(),
    }
  }

  /// 解析 JSON 字符串数组
  pub fn from_json_str(json: &str) -> Result<Self, LabelError> {
    let names: Vec<String> = serde_json::from_str(json)?;
    Self::new(names)
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
    let path = path.as_ref();
    debug!("读取标签文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let table = Self::from_json_str(&content)?;
    debug!("标签数量: {}", table.len());
    Ok(table)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  /// 按取模方式查找类别名称，类别索引越界时回绕
  pub fn get_wrapped(&self, class_id: usize) -> &str {
    &self.names[class_id % self.names.len()]
  }

  pub fn as_slice(&self) -> &[String] {
    &self.names
  }
}
