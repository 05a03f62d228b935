// 该文件是 Shicai （识菜） 项目的一部分。
// src/bin/decode_tensor.rs - 解码转储的推理输出
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shicai::{
  FromUrl,
  input::TensorFileInput,
  model::{DecoderBuilder, ImageSize},
  output::{RecordOutput, Render},
};

/// Shicai 解码参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 解码器配置，例如 decoder:///labels.json?score=0.3&iou=0.45&input=640
  #[arg(long, value_name = "DECODER", default_value = "decoder:///")]
  pub decoder: Url,
  /// 推理输出转储，例如 tensor:///output.json
  #[arg(long, value_name = "TENSOR")]
  pub tensor: Url,
  /// 原图宽度
  #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
  pub width: u32,
  /// 原图高度
  #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
  pub height: u32,
  /// 输出路径，例如 record:///result.json?distinct
  #[arg(long, value_name = "OUTPUT", default_value = "record:///")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("解码器配置: {}", args.decoder);
  info!("张量来源: {}", args.tensor);
  info!("原图尺寸: {}x{}", args.width, args.height);
  info!("输出路径: {}", args.output);

  let decoder = DecoderBuilder::from_url(&args.decoder)?.build()?;
  let mut input = TensorFileInput::from_url(&args.tensor)?;
  let output = RecordOutput::from_url(&args.output)?;

  let tensor = input
    .next()
    .ok_or_else(|| anyhow::anyhow!("没有输入张量"))?;

  let now = std::time::Instant::now();
  let result = decoder.detect_fitted(&tensor.as_raw(), ImageSize::new(args.width, args.height))?;
  info!(
    "解码完成，检测到 {} 个物体，耗时: {:.2?}",
    result.len(),
    now.elapsed()
  );

  output.render_result(&result)?;

  Ok(())
}
