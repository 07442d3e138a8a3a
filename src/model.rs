// 该文件是 Jishu （计数） 项目的一部分。
// src/model.rs - 检测数据模型
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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

mod coco;
mod record_source;

pub use self::coco::COCO_CLASSES;
pub use self::record_source::{RecordSource, RecordSourceError};

/// 检测来源：给定一帧图像，产生原始检测结果
///
/// 检测模型本身不在本库中实现，任何能够输出
/// `(x1, y1, x2, y2, confidence, class_index)` 的来源都可以接入。
pub trait DetectionSource {
  type Input;
  type Error;

  fn detect(&self, input: &Self::Input) -> Result<Vec<RawDetection>, Self::Error>;

  /// 类别名称表，必须覆盖 `detect` 可能返回的所有类别索引
  fn class_names(&self) -> &ClassNameTable;
}

/// 原始检测结果，未经过滤与抑制
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
  pub bbox: [f32; 4], // [x1, y1, x2, y2]，不保证 x1 < x2、y1 < y2
  pub confidence: f32,
  pub class_index: u32,
}

impl RawDetection {
  pub fn new(bbox: [f32; 4], confidence: f32, class_index: u32) -> Self {
    Self {
      bbox,
      confidence,
      class_index,
    }
  }
}

/// 像素坐标下的轴对齐矩形，保证 x1 <= x2 且 y1 <= y2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl Rect {
  /// 创建矩形，坐标顺序颠倒时自动交换
  pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self {
      x1: x1.min(x2),
      y1: y1.min(y2),
      x2: x1.max(x2),
      y2: y1.max(y2),
    }
  }

  pub fn width(&self) -> i64 {
    i64::from(self.x2) - i64::from(self.x1)
  }

  pub fn height(&self) -> i64 {
    i64::from(self.y2) - i64::from(self.y1)
  }

  /// 边长可达 2^32 - 1，面积用 i128 存放
  pub fn area(&self) -> i128 {
    i128::from(self.width()) * i128::from(self.height())
  }

  /// 与另一个矩形的交集面积，不相交时为 0
  pub fn intersection_area(&self, other: &Rect) -> i128 {
    let x1 = i128::from(self.x1.max(other.x1));
    let y1 = i128::from(self.y1.max(other.y1));
    let x2 = i128::from(self.x2.min(other.x2));
    let y2 = i128::from(self.y2.min(other.y2));

    (x2 - x1).max(0) * (y2 - y1).max(0)
  }
}

/// 通过过滤与抑制、并已解析出类别名称的检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedDetection {
  pub bbox: Rect,
  pub confidence: f32,
  pub label: String,
  pub class_index: u32,
}

/// 类别索引到类别名称的映射，处理过程中只读
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNameTable {
  names: HashMap<u32, String>,
}

impl ClassNameTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// 按顺序编号：第 i 个名称对应类别索引 i
  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    names
      .into_iter()
      .enumerate()
      .map(|(idx, name)| (idx as u32, name.into()))
      .collect()
  }

  /// COCO 数据集的 80 个类别
  pub fn coco() -> Self {
    Self::from_names(COCO_CLASSES)
  }

  pub fn insert(&mut self, class_index: u32, name: impl Into<String>) -> Option<String> {
    self.names.insert(class_index, name.into())
  }

  pub fn get(&self, class_index: u32) -> Option<&str> {
    self.names.get(&class_index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl FromIterator<(u32, String)> for ClassNameTable {
  fn from_iter<T: IntoIterator<Item = (u32, String)>>(iter: T) -> Self {
    Self {
      names: iter.into_iter().collect(),
    }
  }
}
