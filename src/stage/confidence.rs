// 该文件是 Huji （户籍） 项目的一部分。
// src/stage/confidence.rs - 分类器置信度阈值
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

use crate::{record::DetectionRecord, stage::Split};

/// 划分为 (高于阈值, 不高于阈值)
///
/// 正类置信度严格大于 `cutoff` 才保留，等于阈值归入拒绝集合。
/// 没有分类结果的记录无法超过阈值，同样归入拒绝集合，
/// 最终合并时会因字段不一致而报错。
pub fn split(records: Vec<DetectionRecord>, cutoff: f64) -> Split<DetectionRecord> {
  Split::partition(records, |r| r.positive_confidence().is_some_and(|p| p > cutoff))
}
