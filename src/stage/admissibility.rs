// 该文件是 Huji （户籍） 项目的一部分。
// src/stage/admissibility.rs - 结构性准入过滤
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

use tracing::debug;

use crate::{
  config::CensusConfig,
  record::{Dataset, DetectionRecord},
  stage::Split,
};

/// 记录能否送入分类器
///
/// 需同时满足：四个边界框字段齐全有限且宽高为正、规范视角在白名单中、
/// 数据集带物种真值时物种与目标一致。
pub fn is_admissible(record: &DetectionRecord, species_labelled: bool, config: &CensusConfig) -> bool {
  let bbox_ok = record.bbox().is_some_and(|b| b.w > 0.0 && b.h > 0.0);
  let viewpoint_ok = config.allows_viewpoint(&record.canonical_viewpoint);
  let species_ok = !species_labelled || record.species_label.as_deref() == Some(config.species.as_str());
  bbox_ok && viewpoint_ok && species_ok
}

/// 划分为 (可分析, 结构性拒绝)
///
/// 被拒绝的记录置信度保持“未计算”，以便最终合并时字段一致。
pub fn filter(dataset: Dataset, config: &CensusConfig) -> Split<DetectionRecord> {
  let Dataset {
    records,
    species_labelled,
  } = dataset;

  let mut split = Split::partition(records, |r| is_admissible(r, species_labelled, config));
  for record in split.rejected.iter_mut() {
    record.confidence = None;
    record.log_ar = None;
  }

  debug!(
    "准入过滤: 可分析 {} 条, 拒绝 {} 条 (物种真值: {})",
    split.kept.len(),
    split.rejected.len(),
    species_labelled
  );
  split
}
