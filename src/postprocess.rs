// 该文件是 Jishu （计数） 项目的一部分。
// src/postprocess.rs - 检测结果后处理
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{AcceptedDetection, ClassNameTable, RawDetection};

pub mod filter;
pub mod histogram;
pub mod nms;

pub use self::histogram::LabelHistogram;

/// 置信度阈值默认值
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// NMS IoU 阈值默认值
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// 配置错误，对单次调用是致命的
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostProcessError {
  #[error("无效配置: {name} = {value}, 必须位于 [0, 1] 范围内")]
  InvalidConfiguration { name: &'static str, value: f32 },
}

/// 单条检测的错误，只会丢弃该条检测
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum DetectionError {
  #[error("无效检测: 置信度 {0} 超出 [0, 1] 范围")]
  InvalidConfidence(f32),
  #[error("无效检测: 坐标不是有限数值 {0:?}")]
  NonFiniteCoordinate([f32; 4]),
  #[error("未知类别索引: {0}")]
  UnknownClassIndex(u32),
}

impl DetectionError {
  /// 是否属于无效检测（而非类别缺失）
  pub fn is_invalid_detection(&self) -> bool {
    matches!(
      self,
      DetectionError::InvalidConfidence(_) | DetectionError::NonFiniteCoordinate(_)
    )
  }
}

/// 被丢弃的检测及其原因，`index` 为原始输入中的位置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
  pub index: usize,
  pub error: DetectionError,
}

/// 抑制方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NmsMode {
  /// 不做抑制
  #[value(name = "none")]
  Disabled,
  /// 仅在同一类别内抑制
  #[default]
  ClassAware,
  /// 跨类别抑制
  ClassAgnostic,
}

/// 后处理配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostProcessConfig {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub nms: NmsMode,
}

impl Default for PostProcessConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      nms: NmsMode::default(),
    }
  }
}

impl PostProcessConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_nms(mut self, nms: NmsMode) -> Self {
    self.nms = nms;
    self
  }

  /// 检查阈值范围；IoU 阈值不小于 1 时只给出警告，不做修正
  pub fn validate(&self) -> Result<(), PostProcessError> {
    for (name, value) in [
      ("confidence_threshold", self.confidence_threshold),
      ("iou_threshold", self.iou_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(PostProcessError::InvalidConfiguration { name, value });
      }
    }

    if self.nms != NmsMode::Disabled && self.iou_threshold >= 1.0 {
      warn!(
        "NMS IoU 阈值为 {}, 即使完全重合的框也不会被抑制, 请确认配置",
        self.iou_threshold
      );
    }

    Ok(())
  }
}

/// 后处理结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostProcessResult {
  /// 按置信度降序排列的最终检测
  pub detections: Vec<AcceptedDetection>,
  pub histogram: LabelHistogram,
  pub diagnostics: Vec<Diagnostic>,
}

impl PostProcessResult {
  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

/// 以类别内 NMS 处理原始检测
pub fn process(
  raw: &[RawDetection],
  class_names: &ClassNameTable,
  confidence_threshold: f32,
  iou_threshold: f32,
) -> Result<PostProcessResult, PostProcessError> {
  let config = PostProcessConfig::default()
    .with_confidence_threshold(confidence_threshold)
    .with_iou_threshold(iou_threshold);
  process_with(raw, class_names, &config)
}

/// 后处理流程：校验、置信度过滤、类别解析、抑制、计数
///
/// 不做任何 I/O，同一输入与配置总是得到相同结果。
pub fn process_with(
  raw: &[RawDetection],
  class_names: &ClassNameTable,
  config: &PostProcessConfig,
) -> Result<PostProcessResult, PostProcessError> {
  config.validate()?;

  let mut diagnostics = Vec::new();
  let mut candidates = Vec::with_capacity(raw.len());

  for (index, det) in raw.iter().enumerate() {
    let bbox = match filter::normalize(det) {
      Ok(bbox) => bbox,
      Err(error) => {
        warn!("丢弃第 {} 条检测: {}", index, error);
        diagnostics.push(Diagnostic { index, error });
        continue;
      }
    };

    if !filter::passes_confidence(det.confidence, config.confidence_threshold) {
      debug!(
        "第 {} 条检测置信度 {:.2} 低于阈值 {:.2}",
        index, det.confidence, config.confidence_threshold
      );
      continue;
    }

    let Some(label) = class_names.get(det.class_index) else {
      let error = DetectionError::UnknownClassIndex(det.class_index);
      warn!("丢弃第 {} 条检测: {}", index, error);
      diagnostics.push(Diagnostic { index, error });
      continue;
    };

    candidates.push(AcceptedDetection {
      bbox,
      confidence: det.confidence,
      label: label.to_string(),
      class_index: det.class_index,
    });
  }

  let detections = match config.nms {
    NmsMode::Disabled => {
      nms::sort_by_confidence(&mut candidates);
      candidates
    }
    NmsMode::ClassAware => nms::non_max_suppression(candidates, config.iou_threshold, true),
    NmsMode::ClassAgnostic => nms::non_max_suppression(candidates, config.iou_threshold, false),
  };

  let histogram = LabelHistogram::from_detections(&detections);
  info!(
    "后处理完成: 输入 {} 条, 保留 {} 条, 丢弃 {} 条无效检测",
    raw.len(),
    detections.len(),
    diagnostics.len()
  );

  Ok(PostProcessResult {
    detections,
    histogram,
    diagnostics,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Rect;

  fn cats() -> ClassNameTable {
    ClassNameTable::from_names(["cat", "dog"])
  }

  #[test]
  fn default_config_is_valid() {
    assert_eq!(PostProcessConfig::default().validate(), Ok(()));
  }

  #[test]
  fn rejects_thresholds_outside_unit_range() {
    let table = cats();
    let raw = [RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0)];

    for (confidence, iou) in [(-0.1, 0.5), (1.5, 0.5), (0.5, -0.01), (0.5, 1.01), (f32::NAN, 0.5)] {
      let result = process(&raw, &table, confidence, iou);
      assert!(matches!(
        result,
        Err(PostProcessError::InvalidConfiguration { .. })
      ));
    }

    let err = process(&raw, &table, 0.5, 2.0).unwrap_err();
    assert_eq!(
      err,
      PostProcessError::InvalidConfiguration {
        name: "iou_threshold",
        value: 2.0
      }
    );
  }

  #[test]
  fn iou_threshold_of_one_is_accepted_unchanged() {
    let config = PostProcessConfig::default().with_iou_threshold(1.0);
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.iou_threshold, 1.0);

    let raw = [
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0),
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.8, 0),
    ];
    let result = process_with(&raw, &cats(), &config).unwrap();
    assert_eq!(result.len(), 2);
  }

  #[test]
  fn invalid_detections_are_skipped_with_diagnostics() {
    let raw = [
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 1.2, 0),
      RawDetection::new([0.0, f32::NAN, 10.0, 10.0], 0.9, 0),
      RawDetection::new([30.0, 30.0, 40.0, 40.0], 0.9, 1),
    ];
    let result = process(&raw, &cats(), 0.5, 0.5).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.detections[0].label, "dog");
    assert_eq!(result.diagnostics.len(), 2);
    assert_eq!(result.diagnostics[0].index, 0);
    assert_eq!(result.diagnostics[1].index, 1);
    assert!(result.diagnostics.iter().all(|d| d.error.is_invalid_detection()));
  }

  #[test]
  fn unknown_class_cannot_suppress_known_class() {
    let raw = [
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.95, 42),
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0),
    ];
    let config = PostProcessConfig::default().with_nms(NmsMode::ClassAgnostic);
    let result = process_with(&raw, &cats(), &config).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.detections[0].label, "cat");
    assert_eq!(
      result.diagnostics,
      vec![Diagnostic {
        index: 0,
        error: DetectionError::UnknownClassIndex(42)
      }]
    );
  }

  #[test]
  fn below_threshold_unknown_class_is_silently_filtered() {
    let raw = [RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.1, 42)];
    let result = process(&raw, &cats(), 0.5, 0.5).unwrap();
    assert!(result.is_empty());
    assert!(result.diagnostics.is_empty());
  }

  #[test]
  fn disabled_nms_keeps_everything_sorted() {
    let raw = [
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.6, 0),
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0),
      RawDetection::new([1.0, 1.0, 10.0, 10.0], 0.7, 1),
    ];
    let config = PostProcessConfig::default().with_nms(NmsMode::Disabled);
    let result = process_with(&raw, &cats(), &config).unwrap();

    let confidences: Vec<f32> = result.detections.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.7, 0.6]);
    assert_eq!(result.histogram.get("cat"), 2);
    assert_eq!(result.histogram.get("dog"), 1);
  }

  #[test]
  fn class_aware_and_agnostic_differ_on_cross_class_overlap() {
    let raw = [
      RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0),
      RawDetection::new([1.0, 1.0, 10.0, 10.0], 0.8, 1),
    ];
    let table = cats();

    let aware = process(&raw, &table, 0.5, 0.5).unwrap();
    assert_eq!(aware.len(), 2);

    let config = PostProcessConfig::default()
      .with_iou_threshold(0.5)
      .with_nms(NmsMode::ClassAgnostic);
    let agnostic = process_with(&raw, &table, &config).unwrap();
    assert_eq!(agnostic.len(), 1);
    assert_eq!(agnostic.histogram.get("cat"), 1);
    assert_eq!(agnostic.histogram.get("dog"), 0);
  }

  #[test]
  fn boxes_are_normalized_to_integers() {
    let raw = [RawDetection::new([10.7, 9.2, 0.4, 0.9], 0.9, 0)];
    let result = process(&raw, &cats(), 0.5, 0.5).unwrap();
    assert_eq!(result.detections[0].bbox, Rect::new(0, 0, 10, 9));
  }

  #[test]
  fn runs_concurrently_with_shared_table() {
    let table = cats();
    let raw: Vec<RawDetection> = (0..32)
      .map(|i| {
        let offset = (i % 8) as f32 * 3.0;
        RawDetection::new(
          [offset, offset, offset + 20.0, offset + 20.0],
          0.5 + (i % 5) as f32 * 0.1,
          i % 2,
        )
      })
      .collect();
    let expected = process(&raw, &table, 0.5, 0.4).unwrap();

    std::thread::scope(|scope| {
      let handles: Vec<_> = (0..4)
        .map(|_| scope.spawn(|| process(&raw, &table, 0.5, 0.4).unwrap()))
        .collect();
      for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
      }
    });
  }
}
