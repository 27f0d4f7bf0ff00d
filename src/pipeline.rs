// 该文件是 Kanjian （看见） 项目的一部分。
// src/pipeline.rs - 检测流水线与过期结果丢弃
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

//! 采集 → 推理 → 映射 → 应用 的顺序流水线。
//!
//! 每次检测开始时领取一个 [`PassToken`]。开始新一轮检测会使之前所有
//! 未完成的轮次失效：它们的结果在应用到显示状态之前被丢弃，
//! 因此较慢的旧推理不会覆盖较新的叠加层。

use std::sync::{
  Arc, Mutex, MutexGuard,
  atomic::{AtomicU64, Ordering},
};

use tracing::{debug, info};

use crate::{
  model::{DetectResult, Model, WithLabel},
  overlay::{CameraFacing, OverlayConfig, OverlaySet, Viewport},
};

/// 一轮检测的凭证
#[derive(Debug, Clone)]
pub struct PassToken {
  generation: u64,
  latest: Arc<AtomicU64>,
}

impl PassToken {
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// 已有更新的一轮检测开始
  pub fn is_cancelled(&self) -> bool {
    self.latest.load(Ordering::Acquire) != self.generation
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
  Applied,
  Discarded,
}

#[derive(Debug)]
struct DisplayState {
  viewport: Viewport,
  facing: CameraFacing,
  current: Option<OverlaySet>,
}

pub struct DetectionPipeline {
  config: OverlayConfig,
  latest: Arc<AtomicU64>,
  state: Mutex<DisplayState>,
}

impl DetectionPipeline {
  pub fn new(config: OverlayConfig, viewport: Viewport, facing: CameraFacing) -> Self {
    Self {
      config,
      latest: Arc::new(AtomicU64::new(0)),
      state: Mutex::new(DisplayState {
        viewport,
        facing,
        current: None,
      }),
    }
  }

  pub fn config(&self) -> &OverlayConfig {
    &self.config
  }

  fn state(&self) -> MutexGuard<'_, DisplayState> {
    // 状态只包含可整体替换的值，锁中毒后仍可继续使用
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn viewport(&self) -> Viewport {
    self.state().viewport
  }

  pub fn facing(&self) -> CameraFacing {
    self.state().facing
  }

  /// 视口变化（如屏幕旋转）后，下一次应用的结果按新尺寸映射
  pub fn set_viewport(&self, viewport: Viewport) {
    debug!("视口变更为 {}", viewport);
    self.state().viewport = viewport;
  }

  pub fn set_facing(&self, facing: CameraFacing) {
    self.state().facing = facing;
  }

  pub fn toggle_facing(&self) -> CameraFacing {
    let mut state = self.state();
    state.facing = state.facing.toggle();
    info!("切换摄像头: {}", state.facing);
    state.facing
  }

  pub fn begin_pass(&self) -> PassToken {
    let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
    debug!("开始第 {} 轮检测", generation);
    PassToken {
      generation,
      latest: Arc::clone(&self.latest),
    }
  }

  /// 映射并应用一轮检测结果；若该轮已被更新的检测取代则丢弃
  pub fn complete<T: WithLabel>(&self, token: &PassToken, result: &DetectResult<T>) -> PassOutcome {
    let mut state = self.state();
    // 持锁判断，避免与并发的 complete 交错
    if token.is_cancelled() {
      debug!("丢弃过期的第 {} 轮检测结果", token.generation);
      return PassOutcome::Discarded;
    }

    let items = self.config.map(&result.items, state.viewport, state.facing);
    debug!(
      "应用第 {} 轮检测结果: {} 个叠加项",
      token.generation,
      items.len()
    );
    state.current = Some(OverlaySet {
      viewport: state.viewport,
      facing: state.facing,
      items: items.into_boxed_slice(),
    });
    PassOutcome::Applied
  }

  /// 开始新一轮、推理并应用
  pub fn run_pass<M, T>(&self, model: &M, frame: &M::Input) -> Result<PassOutcome, M::Error>
  where
    M: Model<Output = DetectResult<T>>,
    T: WithLabel,
  {
    let token = self.begin_pass();
    let result = model.infer(frame)?;
    Ok(self.complete(&token, &result))
  }

  /// 当前显示的叠加层
  pub fn current(&self) -> Option<OverlaySet> {
    self.state().current.clone()
  }

  pub fn clear(&self) {
    self.state().current = None;
  }
}
