// 该文件是 Kanjian （看见） 项目的一部分。
// src/game.rs - 寻物小游戏
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

//! 随机给出一个目标类别，玩家提交照片，照片中检测到该类别即得分。

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use thiserror::Error;
use tracing::info;

use crate::model::{DetectResult, WithLabel};

pub const DEFAULT_TARGETS: [&str; 6] = ["person", "car", "dog", "cat", "chair", "bottle"];

#[derive(Error, Debug, PartialEq)]
pub enum GameError {
  #[error("目标列表为空")]
  NoTargets,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  Found { target: String },
  Missing { target: String },
}

impl Verdict {
  pub fn message(&self) -> String {
    match self {
      Verdict::Found { target } => format!("找到了 {}！继续寻找下一个目标。", target),
      Verdict::Missing { target } => format!("这张照片里没有 {}，换一张试试。", target),
    }
  }
}

pub struct DetectionGame<R: Rng = StdRng> {
  targets: Box<[String]>,
  target: String,
  score: u32,
  rng: R,
}

impl DetectionGame<StdRng> {
  pub fn new<S: Into<String>>(targets: impl IntoIterator<Item = S>) -> Result<Self, GameError> {
    Self::with_rng(targets, StdRng::from_entropy())
  }
}

impl<R: Rng> DetectionGame<R> {
  pub fn with_rng<S: Into<String>>(
    targets: impl IntoIterator<Item = S>,
    mut rng: R,
  ) -> Result<Self, GameError> {
    let targets: Box<[String]> = targets.into_iter().map(Into::into).collect();
    let target = targets.choose(&mut rng).cloned().ok_or(GameError::NoTargets)?;
    info!("游戏开始, 目标: {}", target);
    Ok(Self {
      targets,
      target,
      score: 0,
      rng,
    })
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn score(&self) -> u32 {
    self.score
  }

  pub fn targets(&self) -> &[String] {
    &self.targets
  }

  pub fn select_next_target(&mut self) -> &str {
    if let Some(next) = self.targets.choose(&mut self.rng) {
      self.target = next.clone();
    }
    &self.target
  }

  /// 判定一轮检测结果（不区分大小写），之后总会切换到下一个目标
  pub fn judge<T: WithLabel>(&mut self, result: &DetectResult<T>) -> Verdict {
    let target = self.target.clone();
    let found = result
      .items
      .iter()
      .any(|item| item.kind.to_label_str().eq_ignore_ascii_case(&target));

    let verdict = if found {
      self.score += 1;
      Verdict::Found { target }
    } else {
      Verdict::Missing { target }
    };
    info!("{} 当前得分: {}", verdict.message(), self.score);

    self.select_next_target();
    verdict
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::DetectItem, overlay::ReferenceRect};

  fn detections(labels: &[&'static str]) -> DetectResult<&'static str> {
    labels
      .iter()
      .map(|l| DetectItem::new(*l, 0.9, ReferenceRect::default()))
      .collect::<Vec<_>>()
      .into()
  }

  #[test]
  fn empty_target_list_is_rejected() {
    let err = DetectionGame::new(Vec::<String>::new()).err();
    assert_eq!(err, Some(GameError::NoTargets));
  }

  #[test]
  fn hit_scores_case_insensitively() {
    let mut game = DetectionGame::with_rng(["Dog"], StdRng::seed_from_u64(7)).unwrap();
    assert_eq!(game.target(), "Dog");

    let verdict = game.judge(&detections(&["person", "dog"]));
    assert_eq!(
      verdict,
      Verdict::Found {
        target: "Dog".to_string()
      }
    );
    assert_eq!(game.score(), 1);
  }

  #[test]
  fn miss_keeps_score() {
    let mut game = DetectionGame::with_rng(["cat"], StdRng::seed_from_u64(7)).unwrap();
    let verdict = game.judge(&detections(&["dog"]));
    assert!(matches!(verdict, Verdict::Missing { .. }));
    assert!(verdict.message().contains("cat"));
    assert_eq!(game.score(), 0);
  }

  #[test]
  fn next_target_comes_from_list() {
    let mut game = DetectionGame::with_rng(DEFAULT_TARGETS, StdRng::seed_from_u64(42)).unwrap();
    for _ in 0..20 {
      game.judge(&detections(&[]));
      assert!(DEFAULT_TARGETS.contains(&game.target()));
    }
    assert_eq!(game.score(), 0);
  }
}
