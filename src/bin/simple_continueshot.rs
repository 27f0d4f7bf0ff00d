// 该文件是 Kanjian （看见） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续检测叠加
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
use url::Url;

use kanjian::{
  FromUrl,
  frame::RgbFrame,
  input::InputWrapper,
  model::{Replay, ReplayBuilder},
  output::OutputWrapper,
  overlay::{CameraFacing, DEFAULT_LABEL_MARGIN, OverlayConfig, Viewport},
  pipeline::DetectionPipeline,
  task::{ContinuousTask, Task},
};
use tracing::info;

const REFERENCE_W: u32 = 640;
const REFERENCE_H: u32 = 480;

/// Kanjian 连续检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测记录路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 显示视口尺寸
  #[arg(long, default_value = "640x480", value_name = "WxH")]
  pub viewport: Viewport,
  /// 摄像头朝向 (front / back)
  #[arg(long, default_value = "back", value_name = "FACING")]
  pub facing: CameraFacing,
  /// 标签相对检测框的上移距离
  #[arg(long, default_value_t = DEFAULT_LABEL_MARGIN, value_name = "PIXELS")]
  pub label_margin: f32,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测记录路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::<REFERENCE_W, REFERENCE_H>::from_url(&args.input)?;
  let model: Replay<RgbFrame<REFERENCE_W, REFERENCE_H>> =
    ReplayBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let config = OverlayConfig::default()
    .with_reference(RgbFrame::<REFERENCE_W, REFERENCE_H>::reference())
    .with_label_margin(args.label_margin);
  let pipeline = DetectionPipeline::new(config, args.viewport, args.facing);

  ContinuousTask::new(pipeline)
    .with_frame_number(args.frame_number)
    .with_interrupt(true)
    .run_task(input, model, output)?;

  Ok(())
}
