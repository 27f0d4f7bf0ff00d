// 该文件是 Kanjian （看见） 项目的一部分。
// src/overlay.rs - 检测结果到屏幕叠加层的坐标映射
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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{DetectItem, WithLabel};

pub const DEFAULT_REFERENCE_WIDTH: f32 = 640.0;
pub const DEFAULT_REFERENCE_HEIGHT: f32 = 480.0;
/// 标签相对于检测框上边缘的默认上移距离（像素）
pub const DEFAULT_LABEL_MARGIN: f32 = 8.0;

/// 参考帧坐标系下的矩形，(x, y) 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl ReferenceRect {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }
}

impl From<[f32; 4]> for ReferenceRect {
  /// `[x, y, width, height]`
  fn from([x, y, width, height]: [f32; 4]) -> Self {
    Self::new(x, y, width, height)
  }
}

/// 检测模型实际处理的参考帧尺寸
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSize {
  pub width: f32,
  pub height: f32,
}

impl Default for ReferenceSize {
  fn default() -> Self {
    Self {
      width: DEFAULT_REFERENCE_WIDTH,
      height: DEFAULT_REFERENCE_HEIGHT,
    }
  }
}

impl ReferenceSize {
  pub fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }

  // NaN 与无穷大同样视为无效
  pub fn is_valid(&self) -> bool {
    self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
  }
}

/// 显示表面尺寸，旋转屏幕后可能改变
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
  pub width: f32,
  pub height: f32,
}

impl Viewport {
  pub fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }

  pub fn is_valid(&self) -> bool {
    self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum ViewportParseError {
  #[error("视口格式应为 <宽>x<高>: {0}")]
  Format(String),
  #[error("无法解析视口尺寸: {0}")]
  Number(#[from] std::num::ParseFloatError),
}

impl FromStr for Viewport {
  type Err = ViewportParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (w, h) = s
      .split_once(['x', 'X'])
      .ok_or_else(|| ViewportParseError::Format(s.to_string()))?;
    Ok(Viewport::new(w.trim().parse()?, h.trim().parse()?))
  }
}

impl fmt::Display for Viewport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

/// 摄像头朝向，决定检测框是否需要水平镜像
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
  Front,
  #[default]
  Back,
}

impl CameraFacing {
  pub fn toggle(self) -> Self {
    match self {
      CameraFacing::Front => CameraFacing::Back,
      CameraFacing::Back => CameraFacing::Front,
    }
  }
}

#[derive(Error, Debug, PartialEq)]
#[error("未知的摄像头朝向: {0}")]
pub struct CameraFacingParseError(String);

impl FromStr for CameraFacing {
  type Err = CameraFacingParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "front" => Ok(CameraFacing::Front),
      "back" => Ok(CameraFacing::Back),
      _ => Err(CameraFacingParseError(s.to_string())),
    }
  }
}

impl fmt::Display for CameraFacing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CameraFacing::Front => write!(f, "front"),
      CameraFacing::Back => write!(f, "back"),
    }
  }
}

/// 屏幕坐标系下的矩形
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelAnchor {
  pub x: f32,
  pub y: f32,
}

/// 交给渲染器的叠加项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayItem {
  pub rect: ScreenRect,
  pub label_text: String,
  pub label_anchor: LabelAnchor,
}

/// 一次检测完成后的全部叠加项，以及计算时使用的视口和朝向
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySet {
  pub viewport: Viewport,
  pub facing: CameraFacing,
  pub items: Box<[OverlayItem]>,
}

impl OverlaySet {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum OverlayError {
  #[error("参考帧尺寸无效: {width}x{height}")]
  InvalidReferenceDimensions { width: f32, height: f32 },
  #[error("视口尺寸无效: {width}x{height}")]
  InvalidViewportDimensions { width: f32, height: f32 },
}

/// 映射配置：参考帧尺寸需与检测前的缩放尺寸一致
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
  pub reference: ReferenceSize,
  pub label_margin: f32,
}

impl Default for OverlayConfig {
  fn default() -> Self {
    Self {
      reference: ReferenceSize::default(),
      label_margin: DEFAULT_LABEL_MARGIN,
    }
  }
}

impl OverlayConfig {
  pub fn with_reference(mut self, reference: ReferenceSize) -> Self {
    self.reference = reference;
    self
  }

  pub fn with_label_margin(mut self, label_margin: f32) -> Self {
    self.label_margin = label_margin;
    self
  }

  pub fn map<T: WithLabel>(
    &self,
    detections: &[DetectItem<T>],
    viewport: Viewport,
    facing: CameraFacing,
  ) -> Vec<OverlayItem> {
    map_with_margin(
      detections,
      self.reference,
      viewport,
      facing,
      self.label_margin,
    )
  }

  pub fn try_map<T: WithLabel>(
    &self,
    detections: &[DetectItem<T>],
    viewport: Viewport,
    facing: CameraFacing,
  ) -> Result<Vec<OverlayItem>, OverlayError> {
    try_map_detections(
      detections,
      self.reference,
      viewport,
      facing,
      self.label_margin,
    )
  }
}

/// 将参考帧中的检测结果映射到视口，使用默认标签边距。
///
/// 任何输入都不会 panic：参考帧或视口尺寸无效时返回空列表，
/// 越界或畸形的检测框按原样缩放，不做裁剪或修正。
pub fn map_detections<T: WithLabel>(
  detections: &[DetectItem<T>],
  reference: ReferenceSize,
  viewport: Viewport,
  facing: CameraFacing,
) -> Vec<OverlayItem> {
  map_with_margin(
    detections,
    reference,
    viewport,
    facing,
    DEFAULT_LABEL_MARGIN,
  )
}

fn map_with_margin<T: WithLabel>(
  detections: &[DetectItem<T>],
  reference: ReferenceSize,
  viewport: Viewport,
  facing: CameraFacing,
  label_margin: f32,
) -> Vec<OverlayItem> {
  match try_map_detections(detections, reference, viewport, facing, label_margin) {
    Ok(items) => items,
    Err(e) => {
      debug!("跳过叠加层映射: {}", e);
      Vec::new()
    }
  }
}

/// 与 [`map_detections`] 相同，但区分两种无效尺寸。
pub fn try_map_detections<T: WithLabel>(
  detections: &[DetectItem<T>],
  reference: ReferenceSize,
  viewport: Viewport,
  facing: CameraFacing,
  label_margin: f32,
) -> Result<Vec<OverlayItem>, OverlayError> {
  if !reference.is_valid() {
    return Err(OverlayError::InvalidReferenceDimensions {
      width: reference.width,
      height: reference.height,
    });
  }
  if !viewport.is_valid() {
    return Err(OverlayError::InvalidViewportDimensions {
      width: viewport.width,
      height: viewport.height,
    });
  }

  let sx = viewport.width / reference.width;
  let sy = viewport.height / reference.height;
  // 参考帧过小时缩放系数可能溢出
  if !sx.is_finite() || !sy.is_finite() {
    return Err(OverlayError::InvalidReferenceDimensions {
      width: reference.width,
      height: reference.height,
    });
  }

  let items = detections
    .iter()
    .map(|item| {
      let bbox = &item.bbox;
      let sx_pos = bbox.x * sx;
      let width = bbox.width * sx;
      // 后置摄像头：以视口宽度为轴水平镜像
      let x = match facing {
        CameraFacing::Back => viewport.width - sx_pos - width,
        CameraFacing::Front => sx_pos,
      };
      let y = bbox.y * sy;

      OverlayItem {
        rect: ScreenRect {
          x,
          y,
          width,
          height: bbox.height * sy,
        },
        label_text: label_text(&item.kind.to_label_str(), item.score),
        label_anchor: LabelAnchor {
          x,
          y: (y - label_margin).max(0.0),
        },
      }
    })
    .collect::<Vec<_>>();

  debug!(
    "映射 {} 个检测结果, 缩放 {:.3}x{:.3}, 朝向 {}",
    items.len(),
    sx,
    sy,
    facing
  );

  Ok(items)
}

/// `"<label> (<百分比>%)"`，百分比半数向上取整，按 f64 计算
pub fn label_text(label: &str, score: f32) -> String {
  format!("{} ({}%)", label, score_percent(score))
}

fn score_percent(score: f32) -> i64 {
  (f64::from(score) * 100.0 + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cup() -> DetectItem<&'static str> {
    DetectItem::new("cup", 0.83, ReferenceRect::new(100.0, 50.0, 60.0, 40.0))
  }

  #[test]
  fn half_scale_back_camera_mirrors_box() {
    let items = map_detections(
      &[cup()],
      ReferenceSize::default(),
      Viewport::new(320.0, 240.0),
      CameraFacing::Back,
    );
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.rect.width, 30.0);
    assert_eq!(item.rect.height, 20.0);
    assert_eq!(item.rect.y, 25.0);
    assert_eq!(item.rect.x, 240.0);
    assert_eq!(item.label_text, "cup (83%)");
    assert_eq!(item.label_anchor, LabelAnchor { x: 240.0, y: 17.0 });
  }

  #[test]
  fn half_scale_front_camera_keeps_x() {
    let items = map_detections(
      &[cup()],
      ReferenceSize::default(),
      Viewport::new(320.0, 240.0),
      CameraFacing::Front,
    );
    assert_eq!(items[0].rect.x, 50.0);
    assert_eq!(items[0].label_anchor, LabelAnchor { x: 50.0, y: 17.0 });
  }

  #[test]
  fn label_anchor_clamped_to_top_edge() {
    let item = DetectItem::new("person", 0.5, ReferenceRect::new(10.0, 4.0, 20.0, 20.0));
    let items = map_detections(
      &[item],
      ReferenceSize::default(),
      Viewport::new(640.0, 480.0),
      CameraFacing::Front,
    );
    assert_eq!(items[0].rect.y, 4.0);
    assert_eq!(items[0].label_anchor.y, 0.0);
  }

  #[test]
  fn configured_margin_is_used() {
    let config = OverlayConfig::default().with_label_margin(10.0);
    let items = config.map(&[cup()], Viewport::new(640.0, 480.0), CameraFacing::Front);
    assert_eq!(items[0].label_anchor.y, 40.0);
  }

  #[test]
  fn degenerate_dimensions_yield_empty() {
    let reference = ReferenceSize::default();
    assert!(
      map_detections(&[cup()], reference, Viewport::new(0.0, 0.0), CameraFacing::Back).is_empty()
    );
    assert!(
      map_detections(
        &[cup()],
        ReferenceSize::new(0.0, 480.0),
        Viewport::new(320.0, 240.0),
        CameraFacing::Front
      )
      .is_empty()
    );
    assert!(
      map_detections(
        &[cup()],
        ReferenceSize::new(f32::NAN, 480.0),
        Viewport::new(320.0, 240.0),
        CameraFacing::Front
      )
      .is_empty()
    );
  }

  #[test]
  fn try_map_reports_which_dimension_is_invalid() {
    let err = try_map_detections(
      &[cup()],
      ReferenceSize::new(640.0, -1.0),
      Viewport::new(320.0, 240.0),
      CameraFacing::Back,
      DEFAULT_LABEL_MARGIN,
    )
    .unwrap_err();
    assert!(matches!(err, OverlayError::InvalidReferenceDimensions { .. }));

    let err = try_map_detections(
      &[cup()],
      ReferenceSize::default(),
      Viewport::new(320.0, 0.0),
      CameraFacing::Back,
      DEFAULT_LABEL_MARGIN,
    )
    .unwrap_err();
    assert_eq!(
      err,
      OverlayError::InvalidViewportDimensions {
        width: 320.0,
        height: 0.0
      }
    );
  }

  #[test]
  fn malformed_geometry_passes_through() {
    let item = DetectItem::new("cat", 1.5, ReferenceRect::new(-20.0, 600.0, -10.0, 40.0));
    let items = map_detections(
      &[item],
      ReferenceSize::default(),
      Viewport::new(640.0, 480.0),
      CameraFacing::Front,
    );
    assert_eq!(
      items[0].rect,
      ScreenRect {
        x: -20.0,
        y: 600.0,
        width: -10.0,
        height: 40.0
      }
    );
    assert_eq!(items[0].label_text, "cat (150%)");
  }

  #[test]
  fn percent_rounds_half_up() {
    assert_eq!(label_text("dog", 0.0), "dog (0%)");
    assert_eq!(label_text("dog", 1.0), "dog (100%)");
    assert_eq!(label_text("dog", 0.125), "dog (13%)");
    assert_eq!(label_text("dog", 0.994), "dog (99%)");
  }

  #[test]
  fn percent_computed_in_double_precision() {
    assert_eq!(label_text("dog", 0.285), "dog (28%)");
    assert_eq!(label_text("dog", 0.145), "dog (14%)");
    assert_eq!(label_text("dog", 0.575), "dog (57%)");
  }

  #[test]
  fn non_finite_scale_yields_empty() {
    let viewport: Viewport = "infx480".parse().unwrap();
    assert!(!viewport.is_valid());
    assert!(map_detections(&[cup()], ReferenceSize::default(), viewport, CameraFacing::Back).is_empty());

    let tiny = ReferenceSize::new(1e-40, 480.0);
    let err = try_map_detections(
      &[cup()],
      tiny,
      Viewport::new(320.0, 240.0),
      CameraFacing::Back,
      DEFAULT_LABEL_MARGIN,
    )
    .unwrap_err();
    assert!(matches!(err, OverlayError::InvalidReferenceDimensions { .. }));
    assert!(map_detections(&[cup()], tiny, Viewport::new(320.0, 240.0), CameraFacing::Front).is_empty());
  }

  #[test]
  fn viewport_and_facing_parse() {
    assert_eq!("320x240".parse::<Viewport>(), Ok(Viewport::new(320.0, 240.0)));
    assert_eq!(" 390 X 844 ".parse::<Viewport>(), Ok(Viewport::new(390.0, 844.0)));
    assert!("320".parse::<Viewport>().is_err());
    assert_eq!("Front".parse::<CameraFacing>(), Ok(CameraFacing::Front));
    assert_eq!("back".parse::<CameraFacing>(), Ok(CameraFacing::Back));
    assert!("side".parse::<CameraFacing>().is_err());
    assert_eq!(CameraFacing::Back.toggle(), CameraFacing::Front);
  }
}
