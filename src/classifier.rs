// 该文件是 Huji （户籍） 项目的一部分。
// src/classifier.rs - 普查标注分类器接口
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

use std::convert::Infallible;

use crate::record::{DetectionRecord, Softmax};

mod logits_field;
pub use self::logits_field::{LogitsFieldClassifier, LogitsFieldError};

#[cfg(feature = "crop_classifier")]
mod crop;
#[cfg(feature = "crop_classifier")]
pub use self::crop::{CropClassifier, CropError, crop_patch};

/// 为一条可分析记录给出 {负类, 正类} 概率
pub trait Classifier {
  type Error: std::error::Error + Send + Sync + 'static;

  fn classify(&self, record: &DetectionRecord) -> Result<Softmax, Self::Error>;

  /// 小批量推理，必须为每条记录返回一个结果且保持顺序
  fn classify_batch(&self, batch: &[&DetectionRecord]) -> Result<Vec<Softmax>, Self::Error> {
    batch.iter().map(|record| self.classify(record)).collect()
  }
}

impl<C: Classifier + ?Sized> Classifier for &C {
  type Error = C::Error;

  fn classify(&self, record: &DetectionRecord) -> Result<Softmax, Self::Error> {
    (**self).classify(record)
  }

  fn classify_batch(&self, batch: &[&DetectionRecord]) -> Result<Vec<Softmax>, Self::Error> {
    (**self).classify_batch(batch)
  }
}

/// 由闭包给出分数的确定性分类器
pub struct FnClassifier<F>(pub F);

impl<F> Classifier for FnClassifier<F>
where
  F: Fn(&DetectionRecord) -> Softmax,
{
  type Error = Infallible;

  fn classify(&self, record: &DetectionRecord) -> Result<Softmax, Self::Error> {
    Ok((self.0)(record))
  }
}
