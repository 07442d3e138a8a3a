// 该文件是 Jishu （计数） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use std::{cmp::Ordering, collections::VecDeque};

use crate::model::{AcceptedDetection, Rect};

/// 可参与非极大值抑制的候选框
pub trait Suppress {
  fn rect(&self) -> &Rect;
  fn confidence(&self) -> f32;
  fn class_index(&self) -> u32;
}

impl Suppress for AcceptedDetection {
  fn rect(&self) -> &Rect {
    &self.bbox
  }

  fn confidence(&self) -> f32 {
    self.confidence
  }

  fn class_index(&self) -> u32 {
    self.class_index
  }
}

/// 计算两个边界框的 IoU，并集面积为 0 时返回 0
pub fn iou(a: &Rect, b: &Rect) -> f32 {
  let intersection = a.intersection_area(b);
  let union = a.area() + b.area() - intersection;

  if union > 0 {
    (intersection as f64 / union as f64) as f32
  } else {
    0.0
  }
}

/// 按置信度降序稳定排序，置信度相同的保持原有顺序
pub fn sort_by_confidence<T: Suppress>(candidates: &mut [T]) {
  candidates.sort_by(|a, b| {
    b.confidence()
      .partial_cmp(&a.confidence())
      .unwrap_or(Ordering::Equal)
  });
}

/// 非极大值抑制
///
/// 每轮取出剩余候选中置信度最高者加入结果，并移除与其 IoU 严格大于
/// `iou_threshold` 的候选；IoU 等于阈值时保留。`class_aware` 为真时
/// 只在同一类别内抑制。结果顺序即选取顺序。
pub fn non_max_suppression<T: Suppress>(
  mut candidates: Vec<T>,
  iou_threshold: f32,
  class_aware: bool,
) -> Vec<T> {
  sort_by_confidence(&mut candidates);

  let mut remaining = VecDeque::from(candidates);
  let mut result = Vec::with_capacity(remaining.len());

  while let Some(best) = remaining.pop_front() {
    remaining.retain(|det| {
      if class_aware && det.class_index() != best.class_index() {
        return true;
      }
      iou(best.rect(), det.rect()) <= iou_threshold
    });
    result.push(best);
  }

  result
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(rect: Rect, confidence: f32, class_index: u32) -> AcceptedDetection {
    AcceptedDetection {
      bbox: rect,
      confidence,
      label: format!("class-{}", class_index),
      class_index,
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = Rect::new(3, 4, 13, 24);
    assert_eq!(iou(&a, &a), 1.0);
  }

  #[test]
  fn iou_of_nested_boxes() {
    let a = Rect::new(0, 0, 10, 10);
    let b = Rect::new(1, 1, 10, 10);
    assert!((iou(&a, &b) - 0.81).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = Rect::new(0, 0, 10, 10);
    let b = Rect::new(50, 50, 60, 60);
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn iou_of_degenerate_boxes_is_zero() {
    let point = Rect::new(5, 5, 5, 5);
    let line = Rect::new(0, 5, 10, 5);
    assert_eq!(iou(&point, &point), 0.0);
    assert_eq!(iou(&point, &line), 0.0);
    assert_eq!(iou(&line, &Rect::new(0, 0, 10, 10)), 0.0);
    assert!(!iou(&point, &line).is_nan());
  }

  #[test]
  fn suppresses_overlapping_lower_confidence_box() {
    let boxes = vec![
      det(Rect::new(1, 1, 11, 11), 0.8, 0),
      det(Rect::new(0, 0, 10, 10), 0.9, 0),
      det(Rect::new(20, 20, 30, 30), 0.7, 0),
    ];
    let kept = non_max_suppression(boxes, 0.5, false);

    let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.7]);
  }

  #[test]
  fn iou_equal_to_threshold_is_kept() {
    // IoU = 50 / 100 = 0.5
    let boxes = vec![
      det(Rect::new(0, 0, 10, 10), 0.9, 0),
      det(Rect::new(0, 0, 10, 5), 0.8, 0),
    ];
    assert_eq!(non_max_suppression(boxes.clone(), 0.5, false).len(), 2);
    assert_eq!(non_max_suppression(boxes, 0.49, false).len(), 1);
  }

  #[test]
  fn threshold_of_one_keeps_identical_boxes() {
    let boxes = vec![
      det(Rect::new(0, 0, 10, 10), 0.9, 0),
      det(Rect::new(0, 0, 10, 10), 0.8, 0),
    ];
    assert_eq!(non_max_suppression(boxes, 1.0, false).len(), 2);
  }

  #[test]
  fn ties_keep_original_order() {
    let boxes = vec![
      det(Rect::new(0, 0, 10, 10), 0.5, 1),
      det(Rect::new(0, 0, 10, 10), 0.5, 2),
      det(Rect::new(0, 0, 10, 10), 0.9, 3),
    ];
    let kept = non_max_suppression(boxes, 0.5, false);

    let classes: Vec<u32> = kept.iter().map(|d| d.class_index).collect();
    assert_eq!(classes, vec![3]);

    let mut boxes = vec![
      det(Rect::new(0, 0, 10, 10), 0.5, 1),
      det(Rect::new(40, 0, 50, 10), 0.5, 2),
      det(Rect::new(80, 0, 90, 10), 0.5, 3),
    ];
    sort_by_confidence(&mut boxes);
    let classes: Vec<u32> = boxes.iter().map(|d| d.class_index).collect();
    assert_eq!(classes, vec![1, 2, 3]);

    // 完全重合且同分时，先出现者胜出
    let boxes = vec![
      det(Rect::new(0, 0, 10, 10), 0.5, 7),
      det(Rect::new(0, 0, 10, 10), 0.5, 8),
    ];
    let kept = non_max_suppression(boxes, 0.5, false);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].class_index, 7);
  }

  #[test]
  fn class_aware_only_suppresses_within_class() {
    let boxes = vec![
      det(Rect::new(0, 0, 10, 10), 0.9, 0),
      det(Rect::new(0, 0, 10, 10), 0.8, 1),
      det(Rect::new(1, 1, 10, 10), 0.7, 0),
    ];
    let kept = non_max_suppression(boxes.clone(), 0.5, true);
    let classes: Vec<u32> = kept.iter().map(|d| d.class_index).collect();
    assert_eq!(classes, vec![0, 1]);

    let kept = non_max_suppression(boxes, 0.5, false);
    assert_eq!(kept.len(), 1);
  }

  #[test]
  fn huge_boxes_do_not_overflow() {
    let full = Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
    let half = Rect::new(0, i32::MIN, i32::MAX, i32::MAX);
    assert_eq!(iou(&full, &full), 1.0);
    assert!((iou(&full, &half) - 0.5).abs() < 1e-6);

    let boxes = vec![det(full, 0.9, 0), det(full, 0.8, 0)];
    let kept = non_max_suppression(boxes, 0.5, false);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].confidence, 0.9);
  }

  #[test]
  fn empty_input_yields_empty_output() {
    let kept = non_max_suppression(Vec::<AcceptedDetection>::new(), 0.5, true);
    assert!(kept.is_empty());
  }
}
