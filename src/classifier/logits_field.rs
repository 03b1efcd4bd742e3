// 该文件是 Huji （户籍） 项目的一部分。
// src/classifier/logits_field.rs - 读取预先计算的分类输出
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

use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::{
  classifier::Classifier,
  record::{DetectionRecord, Softmax},
};

#[derive(Error, Debug)]
pub enum LogitsFieldError {
  #[error("记录 {index} 缺少字段 {field}")]
  Missing { index: usize, field: String },
  #[error("记录 {index} 的字段 {field} 不是两个数值: {value}")]
  Malformed {
    index: usize,
    field: String,
    value: String,
  },
}

/// 从透传列中读取外部推理得到的两个输出值
///
/// 字段可以是 JSON 数组 `[a, b]`，也可以是该数组的字符串形式（来自 CSV 的列）。
/// 默认视为 logits 并做 softmax；`probabilities()` 之后直接视为概率。
#[derive(Debug, Clone)]
pub struct LogitsFieldClassifier {
  field: String,
  probabilities: bool,
}

impl LogitsFieldClassifier {
  pub fn new(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      probabilities: false,
    }
  }

  pub fn probabilities(mut self) -> Self {
    self.probabilities = true;
    self
  }

  pub fn field(&self) -> &str {
    &self.field
  }

  fn parse(value: &Value) -> Option<[f64; 2]> {
    match value {
      Value::Array(items) if items.len() == 2 => Some([items[0].as_f64()?, items[1].as_f64()?]),
      Value::String(text) => serde_json::from_str::<[f64; 2]>(text).ok(),
      _ => None,
    }
  }
}

impl Classifier for LogitsFieldClassifier {
  type Error = LogitsFieldError;

  fn classify(&self, record: &DetectionRecord) -> Result<Softmax, Self::Error> {
    let value = record
      .extra
      .get(&self.field)
      .ok_or_else(|| LogitsFieldError::Missing {
        index: record.index,
        field: self.field.clone(),
      })?;

    let [first, second] = Self::parse(value).ok_or_else(|| {
      error!("记录 {} 的字段 {} 无法解析: {}", record.index, self.field, value);
      LogitsFieldError::Malformed {
        index: record.index,
        field: self.field.clone(),
        value: value.to_string(),
      }
    })?;

    if self.probabilities {
      Ok(Softmax::new(first, second))
    } else {
      Ok(Softmax::from_logits([first, second]))
    }
  }
}
