// 该文件是 Jishu （计数） 项目的一部分。
// src/task.rs - 检测任务
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

use tracing::info;

use crate::{
  model::DetectionSource,
  output::{Render, Summary},
  postprocess::{PostProcessConfig, PostProcessResult, process_with},
};

pub trait Task<I, S, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, source: S, output: O) -> Result<Self::Output, Self::Error>;
}

/// 单张图像：检测、后处理、渲染并汇总
#[derive(Default, Debug)]
pub struct OneShotTask {
  config: PostProcessConfig,
  summary_path: Option<PathBuf>,
}

impl OneShotTask {
  pub fn with_config(mut self, config: PostProcessConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_summary_path(mut self, summary_path: Option<PathBuf>) -> Self {
    self.summary_path = summary_path;
    self
  }
}

impl<
  F,
  SE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  S: DetectionSource<Input = F, Error = SE>,
  O: Render<F, PostProcessResult, Error = RE>,
> Task<I, S, O> for OneShotTask
{
  type Output = PostProcessResult;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, source: S, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;

    info!("输入帧获取成功，开始检测...");
    let now = std::time::Instant::now();
    let raw = source.detect(&frame)?;
    info!("检测完成，共 {} 条原始结果，耗时: {:.2?}", raw.len(), now.elapsed());

    let result = process_with(&raw, source.class_names(), &self.config)?;

    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    let summary = Summary::new(self.config, &result);
    summary.log();
    if let Some(path) = &self.summary_path {
      summary.save_json(path)?;
    }

    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{ClassNameTable, RawDetection};
  use std::{cell::RefCell, convert::Infallible};

  struct FixedSource {
    detections: Vec<RawDetection>,
    class_names: ClassNameTable,
  }

  impl DetectionSource for FixedSource {
    type Input = u32;
    type Error = Infallible;

    fn detect(&self, _input: &u32) -> Result<Vec<RawDetection>, Self::Error> {
      Ok(self.detections.clone())
    }

    fn class_names(&self) -> &ClassNameTable {
      &self.class_names
    }
  }

  #[derive(Default)]
  struct Capture {
    rendered: RefCell<Vec<(u32, usize)>>,
  }

  impl Render<u32, PostProcessResult> for &Capture {
    type Error = Infallible;

    fn render_result(&self, frame: &u32, result: &PostProcessResult) -> Result<(), Self::Error> {
      self.rendered.borrow_mut().push((*frame, result.len()));
      Ok(())
    }
  }

  fn source() -> FixedSource {
    FixedSource {
      detections: vec![
        RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0),
        RawDetection::new([1.0, 1.0, 10.0, 10.0], 0.8, 0),
        RawDetection::new([50.0, 50.0, 60.0, 60.0], 0.3, 0),
      ],
      class_names: ClassNameTable::from_names(["cat"]),
    }
  }

  #[test]
  fn runs_pipeline_on_first_frame() {
    let capture = Capture::default();
    let result = OneShotTask::default()
      .run_task([7u32, 8].into_iter(), source(), &capture)
      .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.histogram.get("cat"), 1);
    assert_eq!(*capture.rendered.borrow(), vec![(7, 1)]);
  }

  #[test]
  fn missing_frame_is_an_error() {
    let capture = Capture::default();
    let result = OneShotTask::default().run_task(std::iter::empty::<u32>(), source(), &capture);
    assert!(result.is_err());
    assert!(capture.rendered.borrow().is_empty());
  }

  #[test]
  fn invalid_config_is_fatal() {
    let capture = Capture::default();
    let config = PostProcessConfig::default().with_confidence_threshold(1.5);
    let result = OneShotTask::default()
      .with_config(config)
      .run_task([1u32].into_iter(), source(), &capture);
    assert!(result.is_err());
    assert!(capture.rendered.borrow().is_empty());
  }

  #[test]
  fn writes_summary_json() {
    let path = std::env::temp_dir().join(format!("jishu-summary-{}.json", std::process::id()));
    let capture = Capture::default();
    OneShotTask::default()
      .with_summary_path(Some(path.clone()))
      .run_task([1u32].into_iter(), source(), &capture)
      .unwrap();

    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["histogram"]["cat"], 1);

    std::fs::remove_file(&path).unwrap();
  }
}
