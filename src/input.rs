// 该文件是 Huji （户籍） 项目的一部分。
// src/input.rs - 检测记录输入
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

use thiserror::Error;

use crate::{FromUrl, record::Dataset};

/// 一次性读出完整的记录集
pub trait ReadDataset {
  type Error;
  fn read_dataset(self) -> Result<Dataset, Self::Error>;
}

impl ReadDataset for Dataset {
  type Error = Infallible;

  fn read_dataset(self) -> Result<Dataset, Self::Error> {
    Ok(self)
  }
}

#[cfg(feature = "jsonl_file")]
mod jsonl_file;
#[cfg(feature = "jsonl_file")]
pub use self::jsonl_file::{JsonlFileInput, JsonlFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "jsonl_file")]
  #[error("JSONL 文件输入错误: {0}")]
  JsonlFileInputError(#[from] JsonlFileInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  #[cfg(feature = "jsonl_file")]
  JsonlFile(JsonlFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "jsonl_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == JsonlFileInput::SCHEME {
        let input = JsonlFileInput::from_url(url)?;
        return Ok(InputWrapper::JsonlFile(input));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl ReadDataset for InputWrapper {
  type Error = InputError;

  fn read_dataset(self) -> Result<Dataset, Self::Error> {
    match self {
      #[cfg(feature = "jsonl_file")]
      InputWrapper::JsonlFile(input) => input.read_dataset().map_err(InputError::from),
    }
  }
}
