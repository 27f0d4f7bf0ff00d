// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/replay.rs - 回放已记录的检测模型输出
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

use std::{
  sync::atomic::{AtomicUsize, Ordering},
  thread,
  time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult, Model},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("检测记录读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测记录解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("参数错误: {0}")]
  InvalidParameter(String),
}

/// 检测模型原生输出中的一条记录，bbox 为 `[x, y, width, height]`
#[derive(Debug, Deserialize)]
struct RecordedDetection {
  class: String,
  score: f32,
  bbox: [f32; 4],
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recording {
  Passes(Vec<Vec<RecordedDetection>>),
  Single(Vec<RecordedDetection>),
}

fn into_result(pass: Vec<RecordedDetection>) -> DetectResult<String> {
  pass
    .into_iter()
    .map(|d| DetectItem::new(d.class, d.score, d.bbox.into()))
    .collect::<Vec<_>>()
    .into()
}

pub struct ReplayBuilder {
  path: String,
  delay: Duration,
}

impl FromUrlWithScheme for ReplayBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayBuilder {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut delay = Duration::ZERO;
    for (k, v) in url.query_pairs() {
      if k == "delay_ms" {
        let ms = v
          .parse::<u64>()
          .map_err(|e| ReplayError::InvalidParameter(format!("delay_ms={}: {}", v, e)))?;
        delay = Duration::from_millis(ms);
      }
    }

    Ok(ReplayBuilder {
      path: url.path().to_string(),
      delay,
    })
  }
}

impl ReplayBuilder {
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn build<Frame>(self) -> Result<Replay<Frame>, ReplayError> {
    info!("加载检测记录: {}", self.path);
    let data = std::fs::read(&self.path)?;
    let passes: Vec<DetectResult<String>> = match serde_json::from_slice(&data)? {
      Recording::Passes(passes) => passes.into_iter().map(into_result).collect(),
      Recording::Single(pass) => vec![into_result(pass)],
    };
    info!("检测记录加载完成, 共 {} 轮", passes.len());

    Ok(Replay::from_passes(passes).with_delay(self.delay))
  }
}

/// 按帧循环回放的检测器，代替真实的预训练模型
pub struct Replay<Frame> {
  passes: Box<[DetectResult<String>]>,
  cursor: AtomicUsize,
  delay: Duration,
  _phantom: std::marker::PhantomData<fn(&Frame)>,
}

impl<Frame> Replay<Frame> {
  pub fn from_passes(passes: Vec<DetectResult<String>>) -> Self {
    Self {
      passes: passes.into_boxed_slice(),
      cursor: AtomicUsize::new(0),
      delay: Duration::ZERO,
      _phantom: std::marker::PhantomData,
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn num_passes(&self) -> usize {
    self.passes.len()
  }
}

impl<Frame> Model for Replay<Frame> {
  type Input = Frame;
  type Output = DetectResult<String>;
  type Error = ReplayError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    if !self.delay.is_zero() {
      thread::sleep(self.delay);
    }

    if self.passes.is_empty() {
      return Ok(DetectResult::default());
    }

    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.passes.len();
    let result = self.passes[index].clone();
    debug!("回放第 {} 轮检测结果: {} 个物体", index, result.len());
    Ok(result)
  }
}
