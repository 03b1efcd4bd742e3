// 该文件是 Huji （户籍） 项目的一部分。
// src/stage/shape.rs - 对数宽高比过滤
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
  record::DetectionRecord,
  stage::{Split, StageError},
};

/// ln(w / h)，宽或高缺失、非有限或不为正时返回 `InvalidGeometry`
pub fn log_aspect_ratio(record: &DetectionRecord) -> Result<f64, StageError> {
  let valid = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
  match (valid(record.bbox_w), valid(record.bbox_h)) {
    (Some(w), Some(h)) => Ok((w / h).ln()),
    _ => {
      error!(
        "记录 {} ({}) 到达形状过滤时几何无效: w={:?}, h={:?}",
        record.index, record.image_id, record.bbox_w, record.bbox_h
      );
      Err(StageError::InvalidGeometry {
        index: record.index,
        image_id: record.image_id.clone(),
        width: record.bbox_w,
        height: record.bbox_h,
      })
    }
  }
}

/// 划分为 (窗口内, 窗口外)，两端均为闭区间
///
/// 两个集合中的记录都会带上计算出的 `log_ar`。
pub fn split(records: Vec<DetectionRecord>, min_log_ar: f64, max_log_ar: f64) -> Result<Split<DetectionRecord>, StageError> {
  Split::try_partition(records, |record| {
    let log_ar = log_aspect_ratio(record)?;
    record.log_ar = Some(log_ar);
    Ok((min_log_ar..=max_log_ar).contains(&log_ar))
  })
}
