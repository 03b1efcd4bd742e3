// 该文件是 Huji （户籍） 项目的一部分。
// src/stage/dedup.rs - 按图像分组的非极大值抑制
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

use rayon::prelude::*;
use tracing::{debug, error};

use crate::{
  record::{BBox, DetectionRecord},
  stage::{Split, StageError},
};

fn bbox_of(record: &DetectionRecord) -> Result<BBox, StageError> {
  record.bbox().ok_or_else(|| {
    error!("记录 {} ({}) 进入去重时缺少边界框", record.index, record.image_id);
    StageError::InvalidGeometry {
      index: record.index,
      image_id: record.image_id.clone(),
      width: record.bbox_w,
      height: record.bbox_h,
    }
  })
}

/// 单张图像内的贪心非极大值抑制
///
/// 按正类置信度降序处理（同分时保持输入顺序），
/// 与所有已接受框的 IoU 都不超过 `iou_threshold` 才接受。
pub fn suppress_group(mut group: Vec<DetectionRecord>, iou_threshold: f64) -> Result<Split<DetectionRecord>, StageError> {
  let score = |r: &DetectionRecord| r.positive_confidence().unwrap_or(f64::NEG_INFINITY);
  group.sort_by(|a, b| score(b).total_cmp(&score(a)).then(a.index.cmp(&b.index)));

  let mut accepted: Vec<BBox> = Vec::with_capacity(group.len());
  let mut split = Split::default();

  for candidate in group {
    let bbox = bbox_of(&candidate)?;
    let overlaps = accepted.iter().any(|kept| kept.iou(&bbox) > iou_threshold);
    if overlaps {
      split.rejected.push(candidate);
    } else {
      accepted.push(bbox);
      split.kept.push(candidate);
    }
  }

  Ok(split)
}

/// 按 `image_id` 分组去重，划分为 (保留, 被抑制)
///
/// 各组互不影响，并行处理；结果按图像 id 升序拼接。
pub fn dedupe(records: Vec<DetectionRecord>, iou_threshold: f64) -> Result<Split<DetectionRecord>, StageError> {
  let mut groups: BTreeMap<String, Vec<DetectionRecord>> = BTreeMap::new();
  for record in records {
    groups.entry(record.image_id.clone()).or_default().push(record);
  }
  debug!("去重: 共 {} 张图像", groups.len());

  let results: Vec<Result<Split<DetectionRecord>, StageError>> = groups
    .into_values()
    .collect::<Vec<_>>()
    .into_par_iter()
    .map(|group| suppress_group(group, iou_threshold))
    .collect();

  let mut split = Split::default();
  for result in results {
    split.extend(result?);
  }
  Ok(split)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::Softmax;

  fn scored(index: usize, image: &str, bbox: BBox, positive: f64) -> DetectionRecord {
    DetectionRecord::new(index, image, bbox, "left").with_confidence(Softmax::new(1.0 - positive, positive))
  }

  fn indices(records: &[DetectionRecord]) -> Vec<usize> {
    let mut indices: Vec<_> = records.iter().map(|r| r.index).collect();
    indices.sort_unstable();
    indices
  }

  #[test]
  fn overlapping_lower_score_is_suppressed() {
    let records = vec![
      scored(0, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), 0.9),
      scored(1, "a.jpg", BBox::new(1.0, 1.0, 10.0, 10.0), 0.8),
      scored(2, "a.jpg", BBox::new(50.0, 50.0, 10.0, 10.0), 0.7),
    ];
    let split = dedupe(records, 0.5).unwrap();
    assert_eq!(indices(&split.kept), vec![0, 2]);
    assert_eq!(indices(&split.rejected), vec![1]);
  }

  #[test]
  fn higher_score_survives_regardless_of_input_order() {
    let records = vec![
      scored(0, "a.jpg", BBox::new(1.0, 1.0, 10.0, 10.0), 0.6),
      scored(1, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), 0.95),
    ];
    let split = dedupe(records, 0.5).unwrap();
    assert_eq!(indices(&split.kept), vec![1]);
    assert_eq!(indices(&split.rejected), vec![0]);
  }

  #[test]
  fn ties_keep_input_order() {
    let records = vec![
      scored(0, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), 0.8),
      scored(1, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), 0.8),
    ];
    let split = dedupe(records, 0.5).unwrap();
    assert_eq!(indices(&split.kept), vec![0]);
  }

  #[test]
  fn iou_equal_to_threshold_is_accepted() {
    // IoU = 50 / 150 = 1/3
    let a = BBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BBox::new(5.0, 0.0, 10.0, 10.0);
    let threshold = a.iou(&b);
    let records = vec![scored(0, "a.jpg", a, 0.9), scored(1, "a.jpg", b, 0.8)];
    let split = dedupe(records, threshold).unwrap();
    assert_eq!(split.kept.len(), 2);
  }

  #[test]
  fn groups_do_not_interact() {
    let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
    let records = vec![
      scored(0, "b.jpg", bbox, 0.9),
      scored(1, "a.jpg", bbox, 0.8),
      scored(2, "b.jpg", bbox, 0.7),
    ];
    let split = dedupe(records, 0.5).unwrap();
    assert_eq!(indices(&split.kept), vec![0, 1]);
    assert_eq!(indices(&split.rejected), vec![2]);
    // 按图像 id 升序拼接
    assert_eq!(split.kept[0].image_id, "a.jpg");
  }

  #[test]
  fn suppression_is_greedy_not_transitive() {
    // 0 抑制 1，但 2 只与 1 重叠，因此保留
    let records = vec![
      scored(0, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), 0.9),
      scored(1, "a.jpg", BBox::new(4.0, 0.0, 10.0, 10.0), 0.8),
      scored(2, "a.jpg", BBox::new(8.0, 0.0, 10.0, 10.0), 0.7),
    ];
    let split = dedupe(records, 0.3).unwrap();
    assert_eq!(indices(&split.kept), vec![0, 2]);
    assert_eq!(indices(&split.rejected), vec![1]);
  }

  #[test]
  fn empty_input_gives_empty_split() {
    let split = dedupe(Vec::new(), 0.5).unwrap();
    assert!(split.kept.is_empty());
    assert!(split.rejected.is_empty());

    let split = suppress_group(Vec::new(), 0.5).unwrap();
    assert!(split.is_empty());
  }
}
