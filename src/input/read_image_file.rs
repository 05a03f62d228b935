// 该文件是 Shicai （识菜） 项目的一部分。
// src/input/read_image_file.rs - 读取图像文件并做信箱化
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

use image::{ImageReader, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::LetterboxedFrame,
  model::{ImageSize, LetterboxTransform},
  url_file_path,
};

/// 填充区域的像素值（归一化后）
pub const PAD_VALUE: f32 = 114.0 / 255.0;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("模型输入尺寸必须大于 0")]
  InvalidInputSize,
  #[error("图像尺寸为空: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("路径不是有效的 UTF-8: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
}

pub struct ImageFileInput {
  image: Option<RgbImage>,
  input_size: u32,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  /// `image:///photo.jpg?input=224`，默认输入尺寸 640
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let input_size = url
      .query_pairs()
      .find(|(k, _)| k == "input")
      .and_then(|(_, v)| v.parse().ok())
      .unwrap_or(640);
    if input_size == 0 {
      error!("模型输入尺寸必须大于 0");
      return Err(ImageFileInputError::InvalidInputSize);
    }

    let path = url_file_path(url)?.unwrap_or_default();
    let image = ImageReader::open(&path)?.decode()?.to_rgb8();
    debug!(
      "读取图像 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(ImageFileInput {
      image: Some(image),
      input_size,
    })
  }
}

impl ImageFileInput {
  pub fn from_image(image: RgbImage, input_size: u32) -> Result<Self, ImageFileInputError> {
    if input_size == 0 {
      return Err(ImageFileInputError::InvalidInputSize);
    }
    Ok(Self {
      image: Some(image),
      input_size,
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<LetterboxedFrame, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let input_size = self.input_size;
    self
      .image
      .take()
      .map(|image| letterbox_image(&image, input_size))
  }
}

/// 保持宽高比缩放到 `input_size` 见方并居中填充，输出通道优先、归一化的张量
///
/// 帧上记录的偏移是像素实际放置的整数位置，而不是 `fit` 的小数偏移。
pub fn letterbox_image(
  image: &RgbImage,
  input_size: u32,
) -> Result<LetterboxedFrame, ImageFileInputError> {
  if input_size == 0 {
    return Err(ImageFileInputError::InvalidInputSize);
  }
  let original = ImageSize::new(image.width(), image.height());
  let fitted = LetterboxTransform::fit(original, input_size)
    .ok_or(ImageFileInputError::EmptyImage(original.width, original.height))?;
  let scaled = fitted.scaled_size(original);
  let (scaled_w, scaled_h) = (
    scaled.width.clamp(1, input_size),
    scaled.height.clamp(1, input_size),
  );

  let resized = image::imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);

  let left = (input_size - scaled_w) / 2;
  let top = (input_size - scaled_h) / 2;
  let transform = LetterboxTransform::new(fitted.scale, left as f32, top as f32);
  let (left, top) = (left as usize, top as usize);
  let mut frame = LetterboxedFrame::filled(input_size as usize, PAD_VALUE, transform, original);

  for (x, y, pixel) in resized.enumerate_pixels() {
    for c in 0..frame.channels() {
      frame.set(
        c,
        top + y as usize,
        left + x as usize,
        pixel[c] as f32 / 255.0,
      );
    }
  }

  debug!(
    "信箱化 {}x{} -> {}x{}, 缩放 {:.4}, 偏移 ({:.1}, {:.1})",
    original.width,
    original.height,
    input_size,
    input_size,
    transform.scale,
    transform.offset_x,
    transform.offset_y
  );

  Ok(frame)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn landscape_image_is_padded_top_and_bottom() {
    let image = RgbImage::from_pixel(8, 4, Rgb([255, 0, 0]));
    let frame = letterbox_image(&image, 8).unwrap();

    assert_eq!(frame.shape(), [1, 3, 8, 8]);
    assert_eq!(frame.original(), ImageSize::new(8, 4));
    assert_eq!(frame.transform().offset_y, 2.0);

    // 上下两行是填充
    assert_eq!(frame.get(0, 0, 0), PAD_VALUE);
    assert_eq!(frame.get(0, 7, 7), PAD_VALUE);
    // 中间是原图
    assert_eq!(frame.get(0, 2, 0), 1.0);
    assert_eq!(frame.get(1, 5, 7), 0.0);
  }

  #[test]
  fn iterator_yields_a_single_frame() {
    let image = RgbImage::from_pixel(3, 6, Rgb([0, 255, 0]));
    let mut input = ImageFileInput::from_image(image, 12).unwrap();

    let frame = input.next().unwrap().unwrap();
    assert_eq!(frame.size(), 12);
    assert_eq!(frame.transform().scale, 2.0);
    assert_eq!(frame.transform().offset_x, 3.0);
    assert_eq!(frame.get(1, 0, 3), 1.0);
    assert_eq!(frame.get(1, 0, 2), PAD_VALUE);
    assert!(input.next().is_none());
  }

  #[test]
  fn loads_image_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carrot.png");
    RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}?input=8", path.display())).unwrap();
    let frame = ImageFileInput::from_url(&url).unwrap().next().unwrap().unwrap();
    assert_eq!(frame.size(), 8);
    assert!((frame.get(2, 0, 0) - 30.0 / 255.0).abs() < 1e-6);
  }

  #[test]
  fn loads_image_from_escaped_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("당근 사진.png");
    RgbImage::from_pixel(2, 2, Rgb([0, 0, 255])).save(&path).unwrap();
    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&format!("image://{}?input=4", url.path())).unwrap();

    let frame = ImageFileInput::from_url(&url).unwrap().next().unwrap().unwrap();
    assert_eq!(frame.original(), ImageSize::new(2, 2));
  }

  #[test]
  fn zero_input_size_is_rejected() {
    let image = RgbImage::new(4, 4);
    assert!(matches!(
      letterbox_image(&image, 0),
      Err(ImageFileInputError::InvalidInputSize)
    ));
    assert!(matches!(
      ImageFileInput::from_image(image, 0),
      Err(ImageFileInputError::InvalidInputSize)
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("onion.png");
    RgbImage::new(4, 4).save(&path).unwrap();
    let url = Url::parse(&format!("image://{}?input=0", path.display())).unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::InvalidInputSize)
    ));
  }

  #[test]
  fn empty_image_is_rejected() {
    let mut input = ImageFileInput::from_image(RgbImage::new(0, 3), 8).unwrap();
    assert!(matches!(
      input.next(),
      Some(Err(ImageFileInputError::EmptyImage(0, 3)))
    ));
  }

  #[test]
  fn stored_offset_matches_pixel_placement() {
    // 5x2 -> 8: 缩放 1.6, 缩放后 8x3, 小数偏移 2.4, 实际放在第 2 行
    let image = RgbImage::from_pixel(5, 2, Rgb([255, 0, 0]));
    let frame = letterbox_image(&image, 8).unwrap();
    let t = frame.transform();

    assert!((t.scale - 1.6).abs() < 1e-6);
    assert_eq!(t.offset_x, 0.0);
    assert_eq!(t.offset_y, 2.0);

    assert_eq!(frame.get(0, 1, 0), PAD_VALUE);
    assert!((frame.get(0, 2, 0) - 1.0).abs() < 1e-2);
    assert!((frame.get(0, 4, 0) - 1.0).abs() < 1e-2);
    assert_eq!(frame.get(0, 5, 0), PAD_VALUE);

    // 覆盖整张原图的框映射回原图
    let bbox = t.to_original(4.0, 2.0 + 1.6, 8.0, 3.2);
    assert!(bbox.x.abs() < 1e-4 && bbox.y.abs() < 1e-4);
    assert!((bbox.width - 5.0).abs() < 1e-4 && (bbox.height - 2.0).abs() < 1e-4);
  }
}
