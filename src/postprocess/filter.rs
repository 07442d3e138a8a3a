// 该文件是 Jishu （计数） 项目的一部分。
// src/postprocess/filter.rs - 检测结果校验与置信度过滤
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

use crate::{
  model::{RawDetection, Rect},
  postprocess::DetectionError,
};

/// 置信度过滤：当且仅当 `confidence >= threshold` 时保留
pub fn passes_confidence(confidence: f32, threshold: f32) -> bool {
  confidence >= threshold
}

/// 校验原始检测并将边界框规整为整数像素坐标
///
/// 坐标向零截断，超出 `i32` 范围时取边界值，颠倒的角点会被交换。
pub fn normalize(detection: &RawDetection) -> Result<Rect, DetectionError> {
  if !(0.0..=1.0).contains(&detection.confidence) {
    return Err(DetectionError::InvalidConfidence(detection.confidence));
  }

  if detection.bbox.iter().any(|v| !v.is_finite()) {
    return Err(DetectionError::NonFiniteCoordinate(detection.bbox));
  }

  let [x1, y1, x2, y2] = detection.bbox;
  Ok(Rect::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32))
}
