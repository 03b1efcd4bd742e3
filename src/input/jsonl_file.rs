// 该文件是 Huji （户籍） 项目的一部分。
// src/input/jsonl_file.rs - JSONL 文件输入
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

use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::ReadDataset,
  url_file_path,
  record::{Dataset, DetectionRecord, RawRecord},
};

/// 标记数据集带物种真值的列名
const SPECIES_KEY: &str = "annot species";

#[derive(Error, Debug)]
pub enum JsonlFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("第 {line} 行解析错误: {source}")]
  ParseError {
    line: usize,
    #[source]
    source: serde_json::Error,
  },
}

/// 每行一个 JSON 对象的记录文件
pub struct JsonlFileInput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonlFileInput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonlFileInput {
  type Error = JsonlFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonlFileInputError::SchemeMismatch);
    }

    Ok(JsonlFileInput {
      path: url_file_path(url)?,
    })
  }
}

impl JsonlFileInput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn parse<R: BufRead>(reader: R) -> Result<Dataset, JsonlFileInputError> {
    let mut records = Vec::new();
    let mut species_labelled = false;

    for (line_index, line) in reader.lines().enumerate() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      let parse_error = |source| JsonlFileInputError::ParseError {
        line: line_index + 1,
        source,
      };

      let value: Value = serde_json::from_str(&line).map_err(parse_error)?;
      species_labelled |= value.get(SPECIES_KEY).is_some();
      let raw: RawRecord = serde_json::from_value(value).map_err(parse_error)?;
      records.push(DetectionRecord::from_raw(records.len(), raw));
    }

    Ok(Dataset::new(records).with_species_labelled(species_labelled))
  }
}

impl ReadDataset for JsonlFileInput {
  type Error = JsonlFileInputError;

  fn read_dataset(self) -> Result<Dataset, Self::Error> {
    info!("读取记录文件: {}", self.path.display());
    let file = std::fs::File::open(&self.path)?;
    let dataset = Self::parse(BufReader::new(file))?;
    info!("读取到 {} 条记录", dataset.len());
    Ok(dataset)
  }
}
