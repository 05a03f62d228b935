// 该文件是 Shicai （识菜） 项目的一部分。
// src/model/decoder.rs - 解码器上下文
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
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  label::{LabelError, LabelTable},
  model::{
    DecodeError, DetectResult, ImageSize, LetterboxTransform, RawOutput, decode, suppress,
  },
  url_file_path,
};

const DEFAULT_SCORE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("参数 {0} 无效: {1}")]
  InvalidParameter(String, String),
  #[error("置信度阈值必须在 (0, 1) 之间, 实际为 {0}")]
  InvalidScoreThreshold(f32),
  #[error("IoU 阈值必须在 [0, 1] 之间, 实际为 {0}")]
  InvalidIouThreshold(f32),
  #[error("模型输入尺寸必须大于 0")]
  InvalidInputSize,
  #[error("标签表错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("路径不是有效的 UTF-8: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
}

/// 解码上下文：标签表与阈值，每次推理后由调用方传入原始输出
///
/// 不持有任何可变状态，可在多个线程间共享。
#[derive(Debug, Clone)]
pub struct Decoder {
  labels: LabelTable,
  score_threshold: f32,
  iou_threshold: f32,
  input_size: u32,
  strict_labels: bool,
}

impl Decoder {
  pub fn builder() -> DecoderBuilder {
    DecoderBuilder::default()
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn score_threshold(&self) -> f32 {
    self.score_threshold
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  pub fn input_size(&self) -> u32 {
    self.input_size
  }

  /// 解码并做 NMS
  pub fn detect(
    &self,
    output: &RawOutput<'_>,
    transform: &LetterboxTransform,
    original: ImageSize,
  ) -> Result<DetectResult, DecodeError> {
    if self.strict_labels {
      let classes = output.layout(self.labels.len())?.num_classes();
      if classes != self.labels.len() {
        error!(
          "模型输出 {} 类, 标签表有 {} 项",
          classes,
          self.labels.len()
        );
        return Err(DecodeError::LabelCountMismatch {
          classes,
          labels: self.labels.len(),
        });
      }
    }

    let candidates = decode(
      output,
      transform,
      original,
      self.labels.as_slice(),
      self.score_threshold,
    )?;
    let items = suppress(candidates, self.iou_threshold);
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }

  /// 按本解码器的输入尺寸计算信箱变换后解码
  pub fn detect_fitted(
    &self,
    output: &RawOutput<'_>,
    original: ImageSize,
  ) -> Result<DetectResult, DecodeError> {
    let transform = LetterboxTransform::fit(original, self.input_size).ok_or_else(|| {
      error!("原图尺寸无效: {}x{}", original.width, original.height);
      DecodeError::InvalidImageSize {
        width: original.width,
        height: original.height,
      }
    })?;
    self.detect(output, &transform, original)
  }
}

pub struct DecoderBuilder {
  labels: Option<LabelTable>,
  score_threshold: f32,
  iou_threshold: f32,
  input_size: u32,
  strict_labels: bool,
}

impl Default for DecoderBuilder {
  fn default() -> Self {
    Self {
      labels: None,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      input_size: DEFAULT_INPUT_SIZE,
      strict_labels: false,
    }
  }
}

impl FromUrlWithScheme for DecoderBuilder {
  const SCHEME: &'static str = "decoder";
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
  value
    .parse()
    .map_err(|_| ConfigError::InvalidParameter(key.to_string(), value.to_string()))
}

impl FromUrl for DecoderBuilder {
  type Error = ConfigError;

  /// `decoder:///labels.json?score=0.3&iou=0.45&input=224&strict`，路径为空时使用内置标签表
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ConfigError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut builder = DecoderBuilder::default();

    if let Some(path) = url_file_path(url)? {
      builder = builder.labels(LabelTable::from_json_file(path)?);
    }

    for (k, v) in url.query_pairs() {
      match &*k {
        "score" => builder = builder.score_threshold(parse_param(&k, &v)?),
        "iou" => builder = builder.iou_threshold(parse_param(&k, &v)?),
        "input" => builder = builder.input_size(parse_param(&k, &v)?),
        "strict" => builder = builder.strict_labels(v.is_empty() || parse_param(&k, &v)?),
        _ => return Err(ConfigError::InvalidParameter(k.to_string(), v.to_string())),
      }
    }

    Ok(builder)
  }
}

impl DecoderBuilder {
  pub fn labels(mut self, labels: LabelTable) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn input_size(mut self, size: u32) -> Self {
    self.input_size = size;
    self
  }

  /// 类别数与标签数不一致时返回错误，而不是按取模方式选择标签
  pub fn strict_labels(mut self, strict: bool) -> Self {
    self.strict_labels = strict;
    self
  }

  pub fn build(self) -> Result<Decoder, ConfigError> {
    if !(self.score_threshold > 0.0 && self.score_threshold < 1.0) {
      return Err(ConfigError::InvalidScoreThreshold(self.score_threshold));
    }
    if !(0.0..=1.0).contains(&self.iou_threshold) {
      return Err(ConfigError::InvalidIouThreshold(self.iou_threshold));
    }
    if self.input_size == 0 {
      return Err(ConfigError::InvalidInputSize);
    }

    let labels = self.labels.unwrap_or_default();
    info!(
      "解码器: {} 个标签, 置信度阈值 {}, IoU 阈值 {}, 输入尺寸 {}",
      labels.len(),
      self.score_threshold,
      self.iou_threshold,
      self.input_size
    );

    Ok(Decoder {
      labels,
      score_threshold: self.score_threshold,
      iou_threshold: self.iou_threshold,
      input_size: self.input_size,
      strict_labels: self.strict_labels,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn defaults_build() {
    let decoder = Decoder::builder().build().unwrap();
    assert_eq!(decoder.labels().len(), 20);
    assert_eq!(decoder.score_threshold(), 0.25);
    assert_eq!(decoder.iou_threshold(), 0.45);
    assert_eq!(decoder.input_size(), 640);
  }

  #[test]
  fn rejects_out_of_range_thresholds() {
    assert!(matches!(
      Decoder::builder().score_threshold(0.0).build(),
      Err(ConfigError::InvalidScoreThreshold(_))
    ));
    assert!(matches!(
      Decoder::builder().score_threshold(1.0).build(),
      Err(ConfigError::InvalidScoreThreshold(_))
    ));
    assert!(matches!(
      Decoder::builder().iou_threshold(1.5).build(),
      Err(ConfigError::InvalidIouThreshold(_))
    ));
    assert!(matches!(
      Decoder::builder().input_size(0).build(),
      Err(ConfigError::InvalidInputSize)
    ));
  }

  #[test]
  fn from_url_reads_query() {
    let url = Url::parse("decoder:///?score=0.3&iou=0.5&input=224&strict").unwrap();
    let decoder = DecoderBuilder::from_url(&url).unwrap().build().unwrap();
    assert_eq!(decoder.score_threshold(), 0.3);
    assert_eq!(decoder.iou_threshold(), 0.5);
    assert_eq!(decoder.input_size(), 224);
    assert!(decoder.strict_labels);
  }

  #[test]
  fn from_url_loads_label_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"["apple", "pear"]"#).unwrap();
    let url = Url::from_file_path(file.path()).unwrap();
    let url = Url::parse(&format!("decoder://{}", url.path())).unwrap();

    let decoder = DecoderBuilder::from_url(&url).unwrap().build().unwrap();
    assert_eq!(decoder.labels().as_slice(), ["apple", "pear"]);
  }

  #[test]
  fn from_url_loads_label_file_with_escaped_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("채소 라벨.json");
    std::fs::write(&path, r#"["양파", "파"]"#).unwrap();
    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&format!("decoder://{}?score=0.3", url.path())).unwrap();

    let decoder = DecoderBuilder::from_url(&url).unwrap().build().unwrap();
    assert_eq!(decoder.labels().as_slice(), ["양파", "파"]);
    assert_eq!(decoder.score_threshold(), 0.3);
  }

  #[test]
  fn from_url_rejects_wrong_scheme_and_bad_values() {
    let url = Url::parse("yolo:///model.onnx").unwrap();
    assert!(matches!(
      DecoderBuilder::from_url(&url),
      Err(ConfigError::SchemeMismatch(_))
    ));

    let url = Url::parse("decoder:///?score=high").unwrap();
    assert!(matches!(
      DecoderBuilder::from_url(&url),
      Err(ConfigError::InvalidParameter(..))
    ));

    let url = Url::parse("decoder:///?colour=red").unwrap();
    assert!(matches!(
      DecoderBuilder::from_url(&url),
      Err(ConfigError::InvalidParameter(..))
    ));
  }

  #[test]
  fn strict_labels_rejects_mismatch() {
    let labels = LabelTable::new(["a", "b"]).unwrap();
    let decoder = Decoder::builder()
      .labels(labels)
      .strict_labels(true)
      .build()
      .unwrap();

    let data = [0.0f32; 7];
    let shape = [7, 1];
    let err = decoder
      .detect(
        &RawOutput::new(&data, &shape),
        &LetterboxTransform::identity(),
        ImageSize::new(10, 10),
      )
      .unwrap_err();
    assert_eq!(
      err,
      DecodeError::LabelCountMismatch {
        classes: 3,
        labels: 2
      }
    );
  }

  #[test]
  fn detect_fitted_maps_back_to_original() {
    let labels = LabelTable::new(["a"]).unwrap();
    let decoder = Decoder::builder()
      .labels(labels)
      .input_size(640)
      .build()
      .unwrap();

    // 1280x720 -> scale 0.5, offset_y 140
    let data = [320.0, 320.0, 100.0, 50.0, 0.9];
    let shape = [1, 5, 1];
    let result = decoder
      .detect_fitted(&RawOutput::new(&data, &shape), ImageSize::new(1280, 720))
      .unwrap();

    assert_eq!(result.len(), 1);
    let bbox = result.items[0].bbox;
    assert!((bbox.x - 540.0).abs() < 1e-3);
    assert!((bbox.y - 310.0).abs() < 1e-3);
    assert!((bbox.width - 200.0).abs() < 1e-3);
    assert!((bbox.height - 100.0).abs() < 1e-3);
  }

  #[test]
  fn detect_fitted_rejects_zero_sized_original() {
    let decoder = Decoder::builder()
      .labels(LabelTable::new(["a"]).unwrap())
      .build()
      .unwrap();

    let data = [320.0, 320.0, 100.0, 50.0, 0.9];
    let shape = [1, 5, 1];
    for original in [ImageSize::new(0, 0), ImageSize::new(0, 720), ImageSize::new(1280, 0)] {
      let err = decoder
        .detect_fitted(&RawOutput::new(&data, &shape), original)
        .unwrap_err();
      assert_eq!(
        err,
        DecodeError::InvalidImageSize {
          width: original.width,
          height: original.height
        }
      );
    }
  }
}
