// 该文件是 Huji （户籍） 项目的一部分。
// src/stage.rs - 流水线各阶段
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

//! 每个阶段都是纯划分函数：消费上一阶段保留的记录，返回 (保留, 拒绝) 两个集合。

use thiserror::Error;

use crate::record::Fate;

pub mod admissibility;
pub mod assemble;
pub mod confidence;
pub mod dedup;
pub mod shape;

pub use self::assemble::Partitions;

#[derive(Error, Debug, PartialEq)]
pub enum StageError {
  #[error("记录 {index} ({image_id}) 几何无效: 宽 {width:?}, 高 {height:?}")]
  InvalidGeometry {
    index: usize,
    image_id: String,
    width: Option<f64>,
    height: Option<f64>,
  },
  #[error("分区 {fate} 中的记录 {index} 字段与该分区不一致: {detail}")]
  SchemaMismatch {
    fate: Fate,
    index: usize,
    detail: &'static str,
  },
  #[error("记录守恒被破坏: 输入 {expected} 条, 输出 {actual} 条")]
  ConservationViolated { expected: usize, actual: usize },
}

/// 一个阶段的划分结果
#[derive(Debug, Clone, PartialEq)]
pub struct Split<T> {
  pub kept: Vec<T>,
  pub rejected: Vec<T>,
}

impl<T> Default for Split<T> {
  fn default() -> Self {
    Self {
      kept: Vec::new(),
      rejected: Vec::new(),
    }
  }
}

impl<T> Split<T> {
  pub fn len(&self) -> usize {
    self.kept.len() + self.rejected.len()
  }

  pub fn is_empty(&self) -> bool {
    self.kept.is_empty() && self.rejected.is_empty()
  }

  pub fn partition<F>(items: Vec<T>, keep: F) -> Self
  where
    F: FnMut(&T) -> bool,
  {
    let (kept, rejected) = items.into_iter().partition(keep);
    Self { kept, rejected }
  }

  /// 与 `partition` 相同，但判定可能失败；遇到第一个错误立即返回
  pub fn try_partition<F, E>(items: Vec<T>, mut keep: F) -> Result<Self, E>
  where
    F: FnMut(&mut T) -> Result<bool, E>,
  {
    let mut split = Self::default();
    for mut item in items {
      if keep(&mut item)? {
        split.kept.push(item);
      } else {
        split.rejected.push(item);
      }
    }
    Ok(split)
  }

  pub fn extend(&mut self, other: Split<T>) {
    self.kept.extend(other.kept);
    self.rejected.extend(other.rejected);
  }
}
