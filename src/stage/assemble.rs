// 该文件是 Huji （户籍） 项目的一部分。
// src/stage/assemble.rs - 合并各分区并标记普查结果
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

use tracing::error;

use crate::{
  record::{CensusResult, CensusSummary, DetectionRecord, Fate},
  stage::StageError,
};

/// 五个终端分区
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitions {
  pub survivors: Vec<DetectionRecord>,
  pub below_threshold: Vec<DetectionRecord>,
  pub shape_rejected: Vec<DetectionRecord>,
  pub dedup_suppressed: Vec<DetectionRecord>,
  pub structurally_rejected: Vec<DetectionRecord>,
}

impl Partitions {
  pub fn len(&self) -> usize {
    self.survivors.len()
      + self.below_threshold.len()
      + self.shape_rejected.len()
      + self.dedup_suppressed.len()
      + self.structurally_rejected.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn summary(&self) -> CensusSummary {
    CensusSummary {
      input: self.len(),
      admitted: self.survivors.len(),
      below_threshold: self.below_threshold.len(),
      aspect_ratio: self.shape_rejected.len(),
      duplicate: self.dedup_suppressed.len(),
      inadmissible: self.structurally_rejected.len(),
    }
  }

  /// 按合并顺序列出 (去向, 记录)
  fn iter(&self) -> impl Iterator<Item = (Fate, &DetectionRecord)> {
    tagged(Fate::Admitted, &self.survivors)
      .chain(tagged(Fate::BelowThreshold, &self.below_threshold))
      .chain(tagged(Fate::AspectRatio, &self.shape_rejected))
      .chain(tagged(Fate::Duplicate, &self.dedup_suppressed))
      .chain(tagged(Fate::Inadmissible, &self.structurally_rejected))
  }

  fn into_tagged(self) -> impl Iterator<Item = (Fate, DetectionRecord)> {
    let tag = |fate: Fate, records: Vec<DetectionRecord>| records.into_iter().map(move |r| (fate, r));
    tag(Fate::Admitted, self.survivors)
      .chain(tag(Fate::BelowThreshold, self.below_threshold))
      .chain(tag(Fate::AspectRatio, self.shape_rejected))
      .chain(tag(Fate::Duplicate, self.dedup_suppressed))
      .chain(tag(Fate::Inadmissible, self.structurally_rejected))
  }
}

fn tagged(fate: Fate, records: &[DetectionRecord]) -> impl Iterator<Item = (Fate, &DetectionRecord)> {
  records.iter().map(move |r| (fate, r))
}

/// 各分区应有的字段：(是否有分类结果, 是否计算过宽高比)
fn expected_schema(fate: Fate) -> (bool, bool) {
  match fate {
    Fate::Admitted | Fate::AspectRatio | Fate::Duplicate => (true, true),
    Fate::BelowThreshold => (true, false),
    Fate::Inadmissible => (false, false),
  }
}

fn check_schema(fate: Fate, record: &DetectionRecord) -> Result<(), StageError> {
  let (scored, shaped) = expected_schema(fate);
  let detail = if record.confidence.is_some() != scored {
    Some(if scored { "缺少分类结果" } else { "不应有分类结果" })
  } else if record.log_ar.is_some() != shaped {
    Some(if shaped { "缺少宽高比" } else { "不应有宽高比" })
  } else {
    None
  };

  match detail {
    Some(detail) => {
      error!("分区 {} 中记录 {} 字段不一致: {}", fate, record.index, detail);
      Err(StageError::SchemaMismatch {
        fate,
        index: record.index,
        detail,
      })
    }
    None => Ok(()),
  }
}

/// 合并五个分区为最终结果
///
/// 只有幸存者被标记为普查标注；按 幸存者、低置信度、宽高比、重复、
/// 结构性拒绝 的顺序拼接，丢弃临时字段。输出数量必须等于 `expected`。
pub fn assemble(partitions: Partitions, expected: usize) -> Result<CensusResult, StageError> {
  for (fate, record) in partitions.iter() {
    check_schema(fate, record)?;
  }

  let actual = partitions.len();
  if actual != expected {
    error!("记录守恒被破坏: 输入 {}, 输出 {}", expected, actual);
    return Err(StageError::ConservationViolated { expected, actual });
  }

  let summary = CensusSummary {
    input: expected,
    ..partitions.summary()
  };
  let annotations = partitions
    .into_tagged()
    .map(|(fate, record)| record.into_annotation(fate))
    .collect();

  Ok(CensusResult {
    annotations,
    summary,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::{BBox, Softmax};

  fn bare(index: usize) -> DetectionRecord {
    DetectionRecord::new(index, "img.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), "left")
  }

  fn scored(index: usize) -> DetectionRecord {
    bare(index).with_confidence(Softmax::new(0.2, 0.8))
  }

  fn shaped(index: usize) -> DetectionRecord {
    let mut record = scored(index);
    record.log_ar = Some(0.0);
    record
  }

  fn partitions() -> Partitions {
    Partitions {
      survivors: vec![shaped(0)],
      below_threshold: vec![scored(1)],
      shape_rejected: vec![shaped(2)],
      dedup_suppressed: vec![shaped(3)],
      structurally_rejected: vec![bare(4)],
    }
  }

  #[test]
  fn only_survivors_are_admitted() {
    let result = assemble(partitions(), 5).unwrap();
    assert_eq!(result.annotations.len(), 5);
    let admitted: Vec<_> = result.admitted().map(|a| a.index).collect();
    assert_eq!(admitted, vec![0]);

    let fates: Vec<_> = result.annotations.iter().map(|a| a.fate).collect();
    assert_eq!(
      fates,
      vec![
        Fate::Admitted,
        Fate::BelowThreshold,
        Fate::AspectRatio,
        Fate::Duplicate,
        Fate::Inadmissible
      ]
    );
    assert_eq!(result.annotations[4].ca_score, None);
    assert_eq!(result.annotations[1].ca_score, Some(0.8));
    assert_eq!(result.summary.total(), 5);
  }

  #[test]
  fn count_mismatch_is_fatal() {
    assert_eq!(
      assemble(partitions(), 6),
      Err(StageError::ConservationViolated { expected: 6, actual: 5 })
    );
  }

  #[test]
  fn unscored_record_in_scored_partition_is_schema_mismatch() {
    let mut partitions = partitions();
    partitions.below_threshold.push(bare(5));
    assert!(matches!(
      assemble(partitions, 6),
      Err(StageError::SchemaMismatch {
        fate: Fate::BelowThreshold,
        index: 5,
        ..
      })
    ));
  }

  #[test]
  fn scored_record_in_rejected_partition_is_schema_mismatch() {
    let mut partitions = partitions();
    partitions.structurally_rejected.push(scored(5));
    assert!(matches!(
      assemble(partitions, 6),
      Err(StageError::SchemaMismatch {
        fate: Fate::Inadmissible,
        ..
      })
    ));
  }

  #[test]
  fn empty_partitions_assemble_to_empty_result() {
    let result = assemble(Partitions::default(), 0).unwrap();
    assert!(result.annotations.is_empty());
    assert_eq!(result.summary, CensusSummary::default());
  }
}
