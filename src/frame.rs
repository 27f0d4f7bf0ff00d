// 该文件是 Kanjian （看见） 项目的一部分。
// src/frame.rs - 参考帧定义
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

use image::{RgbImage, imageops::FilterType};

use crate::{input::AsNhwcFrame, overlay::ReferenceSize};

const RGB_CHANNELS: usize = 3;

/// 缩放到固定参考尺寸 W×H 的 RGB 帧，即检测模型的输入
#[derive(Debug, Clone)]
pub struct RgbFrame<const W: u32, const H: u32> {
  image: RgbImage,
}

impl<const W: u32, const H: u32> From<RgbImage> for RgbFrame<W, H> {
  fn from(image: RgbImage) -> Self {
    let image = if image.dimensions() == (W, H) {
      image
    } else {
      image::imageops::resize(&image, W, H, FilterType::Triangle)
    };
    Self { image }
  }
}

impl<const W: u32, const H: u32> Default for RgbFrame<W, H> {
  fn default() -> Self {
    Self {
      image: RgbImage::new(W, H),
    }
  }
}

impl<const W: u32, const H: u32> RgbFrame<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 该帧类型对应的参考帧尺寸
  pub const fn reference() -> ReferenceSize {
    ReferenceSize {
      width: W as f32,
      height: H as f32,
    }
  }

  pub fn reference_size(&self) -> ReferenceSize {
    Self::reference()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame<W, H> for RgbFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    self.image.as_raw()
  }
}
