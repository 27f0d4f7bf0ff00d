// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/log_output.rs - 以日志形式输出叠加项
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
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, overlay::OverlaySet};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 不绘制，只把叠加项写入日志
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }
    Ok(LogOutput)
  }
}

impl<F> Render<F, OverlaySet> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, _frame: &F, result: &OverlaySet) -> Result<(), Self::Error> {
    info!(
      "视口 {} ({}): {} 个叠加项",
      result.viewport,
      result.facing,
      result.items.len()
    );
    for item in result.items.iter() {
      info!(
        "  - {} at ({:.0}, {:.0}, {:.0}x{:.0}), 标签 ({:.0}, {:.0})",
        item.label_text,
        item.rect.x,
        item.rect.y,
        item.rect.width,
        item.rect.height,
        item.label_anchor.x,
        item.label_anchor.y
      );
    }
    Ok(())
  }
}
