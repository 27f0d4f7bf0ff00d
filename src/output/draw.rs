// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/draw.rs - 叠加层可视化
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage, imageops::FilterType};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  frame::RgbFrame,
  overlay::{CameraFacing, OverlayItem, OverlaySet},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 14.0;
const BOX_THICKNESS: i32 = 3;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
  #[error("无效参数: {0}")]
  InvalidParameter(String),
}

pub struct Draw {
  font_size: f32,
  thickness: i32,
  color: [u8; 3],
  font: Option<FontVec>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      thickness: BOX_THICKNESS,
      color: BOX_COLOR,
      font: None,
    }
  }
}

impl Draw {
  /// 没有字体时只绘制检测框
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    self.font = Some(FontVec::try_from_vec(data)?);
    info!("加载标签字体: {}", path.as_ref().display());
    Ok(self)
  }

  pub fn with_font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  /// 读取 URL 中的 `font` 与 `font_size` 参数
  pub fn from_query(url: &Url) -> Result<Self, DrawError> {
    let mut draw = Draw::default();
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "font" => draw = draw.with_font_file(v.as_ref())?,
        "font_size" => {
          let size = v
            .parse::<f32>()
            .ok()
            .filter(|size| size.is_finite() && *size > 0.0)
            .ok_or_else(|| DrawError::InvalidParameter(format!("font_size={}", v)))?;
          draw = draw.with_font_size(size);
        }
        _ => {}
      }
    }
    Ok(draw)
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  fn draw_item(&self, image: &mut RgbImage, item: &OverlayItem) {
    let color = Rgb(self.color);
    let rect = &item.rect;
    if ![rect.x, rect.y, rect.width, rect.height]
      .iter()
      .all(|v| v.is_finite())
    {
      debug!("跳过非有限检测框: {:?}", rect);
      return;
    }

    // 裁剪到图像范围内
    let (iw, ih) = image.dimensions();
    let x_min = rect.x.max(0.0).round() as i32;
    let y_min = rect.y.max(0.0).round() as i32;
    let x_max = (rect.x + rect.width).min(iw as f32).round() as i32;
    let y_max = (rect.y + rect.height).min(ih as f32).round() as i32;
    if x_min >= x_max || y_min >= y_max {
      return;
    }
    let (x, y, w, h) = (x_min, y_min, x_max - x_min, y_max - y_min);

    // 边框向内加粗
    for t in 0..self.thickness {
      let (wt, ht) = (w - 2 * t, h - 2 * t);
      if wt <= 0 || ht <= 0 {
        break;
      }
      let rect = Rect::at(x + t, y + t).of_size(wt as u32, ht as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    if let Some(font) = &self.font {
      // 锚点为文字基线，imageproc 以左上角定位
      let text_x = item.label_anchor.x.clamp(0.0, iw as f32).round() as i32;
      let text_y = (item.label_anchor.y - self.font_size)
        .clamp(0.0, ih as f32)
        .round() as i32;
      draw_text_mut(
        image,
        color,
        text_x,
        text_y,
        PxScale::from(self.font_size),
        font,
        &item.label_text,
      );
    }
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl<const W: u32, const H: u32> ToRgbImage for RgbFrame<W, H> {
  fn to_rgb_image(&self) -> RgbImage {
    self.image().clone()
  }
}

impl ToRgbImage for RgbImage {
  fn to_rgb_image(&self) -> RgbImage {
    self.clone()
  }
}

/// 将帧缩放到视口尺寸；后置摄像头的预览相对传感器帧水平翻转
pub fn compose_preview(image: &RgbImage, overlay: &OverlaySet) -> RgbImage {
  let width = (overlay.viewport.width.round() as u32).max(1);
  let height = (overlay.viewport.height.round() as u32).max(1);
  let mut preview = if image.dimensions() == (width, height) {
    image.clone()
  } else {
    image::imageops::resize(image, width, height, FilterType::Triangle)
  };
  if overlay.facing == CameraFacing::Back {
    image::imageops::flip_horizontal_in_place(&mut preview);
  }
  preview
}

pub trait DrawOverlayOnImage {
  fn draw_overlay_on_image(&self, image: &mut RgbImage, overlay: &OverlaySet);
}

impl DrawOverlayOnImage for Draw {
  fn draw_overlay_on_image(&self, image: &mut RgbImage, overlay: &OverlaySet) {
    debug!("绘制 {} 个叠加项", overlay.items.len());
    for item in overlay.items.iter() {
      self.draw_item(image, item);
    }
  }
}

pub trait DrawOverlayOnFrame<Frame> {
  fn draw_overlay(&self, frame: &Frame, overlay: &OverlaySet) -> RgbImage;
}

impl<Frame: ToRgbImage, D: DrawOverlayOnImage> DrawOverlayOnFrame<Frame> for D {
  fn draw_overlay(&self, frame: &Frame, overlay: &OverlaySet) -> RgbImage {
    let mut image = compose_preview(&frame.to_rgb_image(), overlay);
    self.draw_overlay_on_image(&mut image, overlay);
    image
  }
}

/// 以 JSON 记录叠加项，代替直接绘制
pub struct Record {
  pub pretty: bool,
}

impl Record {
  pub fn record(&self, overlay: &OverlaySet, path: &Path) -> Result<(), std::io::Error> {
    let data = if self.pretty {
      serde_json::to_vec_pretty(overlay)?
    } else {
      serde_json::to_vec(overlay)?
    };
    std::fs::write(path.with_extension("json"), data)?;
    Ok(())
  }
}
