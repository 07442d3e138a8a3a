// 该文件是 Jishu （计数） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use jishu::{NmsMode, PostProcessConfig};
use url::Url;

/// Jishu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///path/to/photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 原始检测记录，例如 record:///path/to/detections.txt?labels=/path/to/names.txt
  /// 未指定 labels 时使用 COCO 类别名称
  #[arg(long, value_name = "DETECTIONS")]
  pub detections: Url,

  /// 输出路径
  /// 支持格式:
  /// - 图片: image:///path/to/out.png[?font=/path/to/font.ttf]
  /// - 目录: folder:///path/to/dir[?record=name|id][&always]
  /// - 仅汇总: null:
  #[arg(long, value_name = "OUTPUT", default_value = "null:")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 抑制方式
  #[arg(long, value_enum, default_value_t = NmsMode::ClassAware)]
  pub nms_mode: NmsMode,

  /// 汇总 JSON 输出路径
  #[arg(long, value_name = "FILE")]
  pub summary: Option<PathBuf>,
}

impl Args {
  pub fn config(&self) -> PostProcessConfig {
    PostProcessConfig::default()
      .with_confidence_threshold(self.confidence)
      .with_iou_threshold(self.nms_threshold)
      .with_nms(self.nms_mode)
  }
}
