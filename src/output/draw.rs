// 该文件是 Jishu （计数） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect as DrawRect;
use thiserror::Error;
use tracing::debug;

use crate::{model::AcceptedDetection, postprocess::PostProcessResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET: i32 = 10; // 文字底部距边框上沿
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 在图像上绘制边框与标签
///
/// 未设置字体时只绘制边框。
#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_size: f32,
  color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      color: BOX_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  /// 未设置字体时不绘制标签文字
  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontArc, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    debug!("加载字体: {}", path.as_ref().display());
    Ok(FontArc::try_from_vec(data)?)
  }

  /// 标签文本，例如 `cat (0.92)`
  pub fn label_text(det: &AcceptedDetection) -> String {
    format!("{} ({:.2})", det.label, det.confidence)
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, det: &AcceptedDetection) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }
    let (w, h) = (image.width() as i32, image.height() as i32);
    let color = Rgb(self.color);

    // 完全位于图像之外
    if det.bbox.x2 < 0 || det.bbox.y2 < 0 || det.bbox.x1 >= w || det.bbox.y1 >= h {
      return;
    }

    // Clamp to image bounds
    let x_min = det.bbox.x1.clamp(0, w - 1);
    let y_min = det.bbox.y1.clamp(0, h - 1);
    let x_max = det.bbox.x2.clamp(0, w - 1);
    let y_max = det.bbox.y2.clamp(0, h - 1);

    let width = (x_max - x_min + 1) as u32;
    let height = (y_max - y_min + 1) as u32;

    // 边框加粗为 2 像素
    draw_hollow_rect_mut(image, DrawRect::at(x_min, y_min).of_size(width, height), color);
    if width > 2 && height > 2 {
      let inner = DrawRect::at(x_min + 1, y_min + 1).of_size(width - 2, height - 2);
      draw_hollow_rect_mut(image, inner, color);
    }

    if let Some(font) = &self.font {
      let label = Self::label_text(det);
      let label_y = (y_min - LABEL_OFFSET - self.font_size as i32).max(0);
      draw_text_mut(
        image,
        color,
        x_min,
        label_y,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
  }
}

pub trait DrawDetectionOnImage {
  fn draw_detections_on_image(&self, image: &mut RgbImage, detections: &[AcceptedDetection]);

  fn draw_detection(&self, image: &RgbImage, result: &PostProcessResult) -> RgbImage {
    let mut canvas = image.clone();
    self.draw_detections_on_image(&mut canvas, &result.detections);
    canvas
  }
}

impl DrawDetectionOnImage for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, detections: &[AcceptedDetection]) {
    for det in detections {
      self.draw_bbox_with_label(image, det);
    }
  }
}

/// 将检测结果写为文本记录
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn lines(&self, result: &PostProcessResult) -> Vec<String> {
    result
      .detections
      .iter()
      .map(|det| {
        let name = if self.label_with_name {
          det.label.clone()
        } else {
          det.class_index.to_string()
        };
        format!(
          "{}, {:.4}, {}, {}, {}, {}",
          name, det.confidence, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2
        )
      })
      .collect()
  }

  pub fn record(&self, result: &PostProcessResult, path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.lines(result).join("\n"))
  }
}
