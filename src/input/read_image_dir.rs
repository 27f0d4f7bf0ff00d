// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/read_image_dir.rs - 图像目录输入
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

use std::{collections::VecDeque, path::PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum ImageDirInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐张读取目录中的照片，模拟连续拍摄
pub struct ImageDirInput<const W: u32, const H: u32> {
  pending: VecDeque<PathBuf>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageDirInput<W, H> {
  const SCHEME: &'static str = "folder";
}

impl<const W: u32, const H: u32> FromUrl for ImageDirInput<W, H> {
  type Error = ImageDirInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirInputError::SchemeMismatch);
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(url.path())? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if path.is_file() && is_image {
        paths.push(path);
      }
    }
    paths.sort();
    info!("图像目录 {}: 共 {} 张图像", url.path(), paths.len());

    Ok(ImageDirInput {
      pending: paths.into(),
    })
  }
}

impl<const W: u32, const H: u32> ImageDirInput<W, H> {
  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl<const W: u32, const H: u32> Iterator for ImageDirInput<W, H> {
  type Item = RgbFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      let decoded = ImageReader::open(&path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());
      match decoded {
        Ok(image) => {
          debug!("读取图像: {}", path.display());
          return Some(image.to_rgb8().into());
        }
        // 单张损坏不终止整个序列
        Err(e) => error!("无法读取图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn broken_image_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::new(8, 8).save(dir.path().join("a.png")).unwrap();
    std::fs::write(dir.path().join("b.png"), b"not a png").unwrap();
    RgbImage::new(8, 8).save(dir.path().join("c.png")).unwrap();
    std::fs::write(dir.path().join("d.txt"), b"notes").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let mut input = ImageDirInput::<16, 12>::from_url(&url).unwrap();
    assert_eq!(input.remaining(), 3);

    assert!(input.next().is_some());
    assert_eq!(input.remaining(), 2);
    // b.png 无法解码，直接读到 c.png
    let frame = input.next().unwrap();
    assert_eq!(frame.image().dimensions(), (16, 12));
    assert_eq!(input.remaining(), 0);
    assert!(input.next().is_none());
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("image:///tmp").unwrap();
    assert!(matches!(
      ImageDirInput::<16, 12>::from_url(&url),
      Err(ImageDirInputError::SchemeMismatch)
    ));
  }
}
