// 该文件是 Kanjian （看见） 项目的一部分。
// src/bin/simple_game.rs - 寻物小游戏
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
  game::{DEFAULT_TARGETS, DetectionGame},
  input::InputWrapper,
  model::{Model, Replay, ReplayBuilder},
};
use tracing::info;

const REFERENCE_W: u32 = 640;
const REFERENCE_H: u32 = 480;

/// Kanjian 寻物游戏参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测记录路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 玩家提交的照片（单张或目录）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 目标类别，逗号分隔
  #[arg(long, value_delimiter = ',', value_name = "LABELS")]
  pub targets: Vec<String>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let input = InputWrapper::<REFERENCE_W, REFERENCE_H>::from_url(&args.input)?;
  let model: Replay<RgbFrame<REFERENCE_W, REFERENCE_H>> =
    ReplayBuilder::from_url(&args.model)?.build()?;

  let mut game = if args.targets.is_empty() {
    DetectionGame::new(DEFAULT_TARGETS)?
  } else {
    DetectionGame::new(args.targets)?
  };

  for (round, frame) in input.enumerate() {
    info!("第 {} 轮, 请寻找: {}", round + 1, game.target());
    let result = model.infer(&frame)?;
    let verdict = game.judge(&result);
    println!("{}", verdict.message());
  }

  println!("最终得分: {}", game.score());
  Ok(())
}
