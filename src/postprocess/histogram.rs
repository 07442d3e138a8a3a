// 该文件是 Jishu （计数） 项目的一部分。
// src/postprocess/histogram.rs - 类别计数
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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::AcceptedDetection;

/// 类别名称到数量的映射，每次处理时重新构建
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelHistogram {
  counts: BTreeMap<String, usize>,
}

impl LabelHistogram {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_detections(detections: &[AcceptedDetection]) -> Self {
    let mut histogram = Self::new();
    for det in detections {
      histogram.increment(&det.label);
    }
    histogram
  }

  pub fn increment(&mut self, label: &str) {
    *self.counts.entry(label.to_string()).or_insert(0) += 1;
  }

  pub fn get(&self, label: &str) -> usize {
    self.counts.get(label).copied().unwrap_or(0)
  }

  /// 所有类别的数量之和
  pub fn total(&self) -> usize {
    self.counts.values().sum()
  }

  pub fn len(&self) -> usize {
    self.counts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
    self.counts.iter().map(|(label, count)| (label.as_str(), *count))
  }
}
