// 该文件是 Kanjian （看见） 项目的一部分。
// src/task.rs - 检测任务
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

use std::{sync::mpsc, thread, time::Duration};
use tracing::{info, warn};

use crate::{
  model::{DetectResult, Model, WithLabel},
  output::Render,
  overlay::OverlaySet,
  pipeline::{DetectionPipeline, PassOutcome},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 处理单帧（导入照片或拍摄一张）
pub struct OneShotTask {
  pipeline: DetectionPipeline,
}

impl OneShotTask {
  pub fn new(pipeline: DetectionPipeline) -> Self {
    Self { pipeline }
  }
}

impl<
  F,
  T: WithLabel,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = DetectResult<T>, Error = ME>,
  O: Render<F, OverlaySet, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    self.pipeline.run_pass(&model, &frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);

    let overlay = self
      .pipeline
      .current()
      .ok_or_else(|| anyhow::anyhow!("没有可显示的检测结果"))?;
    output.render_result(&frame, &overlay)?;
    info!("渲染完成，共 {} 个叠加项", overlay.items.len());

    Ok(())
  }
}

/// 逐帧连续检测，每帧一轮，最新结果覆盖旧结果
pub struct ContinuousTask {
  pipeline: DetectionPipeline,
  frame_number: Option<usize>,
  interruptible: bool,
}

impl ContinuousTask {
  pub fn new(pipeline: DetectionPipeline) -> Self {
    Self {
      pipeline,
      frame_number: None,
      interruptible: false,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理器，整个进程只能安装一次
  pub fn with_interrupt(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }
}

impl<
  F,
  T: WithLabel,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = DetectResult<T>, Error = ME>,
  O: Render<F, OverlaySet, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();

    if self.interruptible {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let mut frame_index = 0usize;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);
      let outcome = self.pipeline.run_pass(&model, &frame)?;
      let elapsed_a = now.elapsed();
      if outcome == PassOutcome::Applied
        && let Some(overlay) = self.pipeline.current()
      {
        output.render_result(&frame, &overlay)?;
      }
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧，退出", frame_index);
    Ok(())
  }
}
