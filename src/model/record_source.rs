// 该文件是 Jishu （计数） 项目的一部分。
// src/model/record_source.rs - 从记录文件回放检测结果
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{ClassNameTable, DetectionSource, RawDetection},
};

const RECORD_FIELDS: usize = 6;

#[derive(Error, Debug)]
pub enum RecordSourceError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录第 {line} 行格式错误: {reason}")]
  ParseError { line: usize, reason: String },
}

/// 记录文件检测来源
///
/// 每行一条检测：`class_index, confidence, x1, y1, x2, y2`，
/// 空行与 `#` 开头的行会被忽略。
pub struct RecordSource {
  detections: Vec<RawDetection>,
  class_names: ClassNameTable,
}

impl FromUrlWithScheme for RecordSource {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordSource {
  type Error = RecordSourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RecordSourceError::SchemeMismatch(url.scheme().to_string()));
    }

    info!("读取检测记录: {}", url.path());
    let detections = Self::parse_records(&std::fs::read_to_string(url.path())?)?;

    let class_names = match url.query_pairs().find(|(k, _)| k == "labels") {
      Some((_, labels)) => {
        info!("读取类别名称: {}", labels);
        Self::parse_labels(&std::fs::read_to_string(&*labels)?)
      }
      None => ClassNameTable::coco(),
    };
    debug!(
      "共 {} 条检测记录, {} 个类别",
      detections.len(),
      class_names.len()
    );

    Ok(Self::new(detections, class_names))
  }
}

impl RecordSource {
  pub fn new(detections: Vec<RawDetection>, class_names: ClassNameTable) -> Self {
    Self {
      detections,
      class_names,
    }
  }

  pub fn parse_records(text: &str) -> Result<Vec<RawDetection>, RecordSourceError> {
    let mut detections = Vec::new();

    for (idx, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }

      let parse_error = |reason: String| RecordSourceError::ParseError {
        line: idx + 1,
        reason,
      };

      let fields: Vec<&str> = line.split(',').map(str::trim).collect();
      if fields.len() != RECORD_FIELDS {
        return Err(parse_error(format!(
          "期望 {} 个字段, 实际 {} 个",
          RECORD_FIELDS,
          fields.len()
        )));
      }

      let class_index = fields[0]
        .parse::<u32>()
        .map_err(|e| parse_error(format!("类别索引 '{}': {}", fields[0], e)))?;

      let mut values = [0.0f32; RECORD_FIELDS - 1];
      for (value, field) in values.iter_mut().zip(&fields[1..]) {
        *value = field
          .parse::<f32>()
          .map_err(|e| parse_error(format!("数值 '{}': {}", field, e)))?;
      }

      let [confidence, x1, y1, x2, y2] = values;
      detections.push(RawDetection::new([x1, y1, x2, y2], confidence, class_index));
    }

    Ok(detections)
  }

  /// 每行一个类别名称，行号（忽略空行）即类别索引
  pub fn parse_labels(text: &str) -> ClassNameTable {
    ClassNameTable::from_names(
      text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty()),
    )
  }
}

impl DetectionSource for RecordSource {
  type Input = RgbImage;
  type Error = RecordSourceError;

  fn detect(&self, input: &Self::Input) -> Result<Vec<RawDetection>, Self::Error> {
    debug!(
      "回放 {} 条检测记录, 图像尺寸 {}x{}",
      self.detections.len(),
      input.width(),
      input.height()
    );
    Ok(self.detections.clone())
  }

  fn class_names(&self) -> &ClassNameTable {
    &self.class_names
  }
}
