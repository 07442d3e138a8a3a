// 该文件是 Jishu （计数） 项目的一部分。
// src/output/summary.rs - 检测结果汇总
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

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  model::AcceptedDetection,
  postprocess::{Diagnostic, LabelHistogram, PostProcessConfig, PostProcessResult},
};

#[derive(Error, Debug)]
pub enum SummaryError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// 单张图像的检测汇总
#[derive(Debug, Clone, Serialize)]
pub struct Summary<'a> {
  pub config: PostProcessConfig,
  pub total: usize,
  pub histogram: &'a LabelHistogram,
  pub detections: &'a [AcceptedDetection],
  pub diagnostics: &'a [Diagnostic],
}

impl<'a> Summary<'a> {
  pub fn new(config: PostProcessConfig, result: &'a PostProcessResult) -> Self {
    Self {
      config,
      total: result.len(),
      histogram: &result.histogram,
      detections: &result.detections,
      diagnostics: &result.diagnostics,
    }
  }

  /// 输出每个类别的数量
  pub fn log(&self) {
    info!("检测结果汇总: 共 {} 个对象", self.total);
    for (label, count) in self.histogram.iter() {
      info!("  - {}: {}", label, count);
    }
    for diagnostic in self.diagnostics {
      warn!("  第 {} 条检测被丢弃: {}", diagnostic.index, diagnostic.error);
    }
  }

  pub fn to_json(&self) -> Result<String, SummaryError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SummaryError> {
    std::fs::write(path.as_ref(), self.to_json()?)?;
    info!("保存汇总到: {}", path.as_ref().display());
    Ok(())
  }
}
