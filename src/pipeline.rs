// 该文件是 Huji （户籍） 项目的一部分。
// src/pipeline.rs - 普查标注流水线
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

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  classifier::Classifier,
  config::{CensusConfig, ConfigError},
  record::{CensusResult, Dataset, DetectionRecord, Softmax},
  stage::{self, Partitions, StageError},
};

/// 概率向量和为 1 的容差
const PROBABILITY_TOLERANCE: f64 = 1e-4;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("阶段错误: {0}")]
  Stage(#[from] StageError),
  #[error("分类器错误: {0}")]
  Classifier(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("分类器返回 {actual} 个结果, 期望 {expected} 个")]
  BatchSizeMismatch { expected: usize, actual: usize },
  #[error("分类器为记录 {index} 返回了无效的概率向量 {softmax:?}")]
  InvalidProbability { index: usize, softmax: Softmax },
}

/// 从准入过滤到结果合并的完整流水线
pub struct CensusPipeline<C> {
  config: CensusConfig,
  classifier: C,
}

impl<C: Classifier> CensusPipeline<C> {
  pub fn new(config: CensusConfig, classifier: C) -> Self {
    Self { config, classifier }
  }

  /// 按小批量调用分类器，为每条记录填入概率向量
  fn score(&self, mut records: Vec<DetectionRecord>) -> Result<Vec<DetectionRecord>, PipelineError> {
    let batch_size = self.config.batch_size.max(1);
    for (batch_index, chunk) in records.chunks_mut(batch_size).enumerate() {
      let batch: Vec<&DetectionRecord> = chunk.iter().collect();
      let outputs = self
        .classifier
        .classify_batch(&batch)
        .map_err(|e| PipelineError::Classifier(Box::new(e)))?;
      if outputs.len() != chunk.len() {
        error!("第 {} 批分类结果数量不匹配", batch_index);
        return Err(PipelineError::BatchSizeMismatch {
          expected: chunk.len(),
          actual: outputs.len(),
        });
      }

      for (record, softmax) in chunk.iter_mut().zip(outputs) {
        if !softmax.is_valid(PROBABILITY_TOLERANCE) {
          return Err(PipelineError::InvalidProbability {
            index: record.index,
            softmax,
          });
        }
        record.confidence = Some(softmax);
      }
      debug!("第 {} 批分类完成, {} 条", batch_index, chunk.len());
    }
    Ok(records)
  }

  /// 把所有记录划分到五个终端分区
  pub fn partition(&self, dataset: Dataset) -> Result<Partitions, PipelineError> {
    let config = &self.config;
    config.validate()?;
    let input_len = dataset.len();
    info!("输入记录数量: {}", input_len);

    let admissible = stage::admissibility::filter(dataset, config);
    debug_assert_eq!(admissible.len(), input_len);

    info!("开始分类, 共 {} 条可分析记录", admissible.kept.len());
    let scored = self.score(admissible.kept)?;

    let confident = stage::confidence::split(scored, config.threshold_ca);
    info!("置信度阈值过滤后数量: {}", confident.kept.len());

    let shaped = stage::shape::split(confident.kept, config.min_log_ar, config.max_log_ar)?;
    info!("宽高比过滤后数量: {}", shaped.kept.len());

    let deduped = stage::dedup::dedupe(shaped.kept, config.nms_threshold)?;
    if deduped.kept.is_empty() {
      warn!("没有记录通过 NMS 过滤");
    }
    info!("NMS 过滤后数量: {}", deduped.kept.len());

    let partitions = Partitions {
      survivors: deduped.kept,
      below_threshold: confident.rejected,
      shape_rejected: shaped.rejected,
      dedup_suppressed: deduped.rejected,
      structurally_rejected: admissible.rejected,
    };
    debug_assert_eq!(partitions.len(), input_len);
    Ok(partitions)
  }

  pub fn run(&self, dataset: Dataset) -> Result<CensusResult, PipelineError> {
    let input_len = dataset.len();
    let partitions = self.partition(dataset)?;
    let result = stage::assemble::assemble(partitions, input_len)?;
    info!("合并后数量: {}", result.annotations.len());
    debug!("分区统计: {:?}", result.summary);
    Ok(result)
  }
}
