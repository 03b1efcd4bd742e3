// 该文件是 Huji （户籍） 项目的一部分。
// src/task.rs - 批处理任务
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

use tracing::info;

use crate::{
  classifier::Classifier, config::CensusConfig, input::ReadDataset, output::Render, pipeline::CensusPipeline,
  record::CensusResult,
};

pub trait Task<I, C, O>: Sized {
  type Error;
  fn run_task(self, input: I, classifier: C, output: O) -> Result<(), Self::Error>;
}

/// 读入全部记录，运行流水线，成功后才写出结果
pub struct CensusTask {
  config: CensusConfig,
}

impl CensusTask {
  pub fn new(config: CensusConfig) -> Self {
    Self { config }
  }
}

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: ReadDataset<Error = IE>,
  C: Classifier,
  O: Render<CensusResult, Error = RE>,
> Task<I, C, O> for CensusTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, classifier: C, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let dataset = input.read_dataset()?;
    info!("记录读取成功，开始处理...");

    let pipeline = CensusPipeline::new(self.config, classifier);
    let now = std::time::Instant::now();
    let result = pipeline.run(dataset)?;
    info!("处理完成，耗时: {:.2?}", now.elapsed());

    output.render_result(&result)?;
    info!(
      "任务完成: {} 条记录中 {} 条为普查标注",
      result.summary.input, result.summary.admitted
    );
    Ok(())
  }
}
