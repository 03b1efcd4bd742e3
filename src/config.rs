// 该文件是 Huji （户籍） 项目的一部分。
// src/config.rs - 普查标注流水线配置
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

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::viewpoint;

const DEFAULT_THRESHOLD_CA: f64 = 0.5;
const DEFAULT_NMS_THRESHOLD: f64 = 0.45;
const DEFAULT_MIN_LOG_AR: f64 = -1.0;
const DEFAULT_MAX_LOG_AR: f64 = 1.0;
const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("YAML 解析错误: {0}")]
  YamlError(#[from] serde_yaml::Error),
  #[error("配置项 {name} 取值无效: {reason}")]
  Invalid { name: &'static str, reason: String },
}

impl ConfigError {
  fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
    ConfigError::Invalid {
      name,
      reason: reason.into(),
    }
  }
}

fn default_batch_size() -> usize {
  DEFAULT_BATCH_SIZE
}

/// 流水线的全部阈值与白名单，运行期间不可变
///
/// YAML 键名沿用分类器配置文件的写法（`threshold_CA`、`NMS_threshold` 等），
/// 未知的键（例如 `device`）会被忽略。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CensusConfig {
  /// 正类置信度阈值，严格大于才通过
  #[serde(rename = "threshold_CA")]
  pub threshold_ca: f64,
  #[serde(rename = "min_log_AR")]
  pub min_log_ar: f64,
  #[serde(rename = "max_log_AR")]
  pub max_log_ar: f64,
  /// 去重 IoU 阈值，取值 [0, 1]
  #[serde(rename = "NMS_threshold")]
  pub nms_threshold: f64,
  /// 允许的规范视角
  pub viewpoints: BTreeSet<String>,
  /// 目标物种，仅在数据集带物种真值时生效
  pub species: String,
  /// 分类器小批量大小
  #[serde(default = "default_batch_size")]
  pub batch_size: usize,
}

impl CensusConfig {
  pub fn new<S, I>(species: impl Into<String>, viewpoints: I) -> Self
  where
    S: Into<String>,
    I: IntoIterator<Item = S>,
  {
    Self {
      threshold_ca: DEFAULT_THRESHOLD_CA,
      min_log_ar: DEFAULT_MIN_LOG_AR,
      max_log_ar: DEFAULT_MAX_LOG_AR,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      viewpoints: viewpoints.into_iter().map(Into::into).collect(),
      species: species.into(),
      batch_size: DEFAULT_BATCH_SIZE,
    }
  }

  pub fn with_threshold_ca(mut self, threshold_ca: f64) -> Self {
    self.threshold_ca = threshold_ca;
    self
  }

  pub fn with_log_ar_bounds(mut self, min_log_ar: f64, max_log_ar: f64) -> Self {
    self.min_log_ar = min_log_ar;
    self.max_log_ar = max_log_ar;
    self
  }

  pub fn with_nms_threshold(mut self, nms_threshold: f64) -> Self {
    self.nms_threshold = nms_threshold;
    self
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    Self::from_yaml_str(&contents)
  }

  pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
    let config: CensusConfig = serde_yaml::from_str(contents)?;
    config.validate()?;
    debug!("配置内容: {:?}", config);
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&self.threshold_ca) {
      return Err(ConfigError::invalid(
        "threshold_CA",
        format!("{} 不在 [0, 1] 内", self.threshold_ca),
      ));
    }
    if !(0.0..=1.0).contains(&self.nms_threshold) {
      return Err(ConfigError::invalid(
        "NMS_threshold",
        format!("{} 不在 [0, 1] 内", self.nms_threshold),
      ));
    }
    if self.min_log_ar.is_nan() || self.max_log_ar.is_nan() {
      return Err(ConfigError::invalid("min_log_AR/max_log_AR", "不能为 NaN"));
    }
    if self.min_log_ar > self.max_log_ar {
      return Err(ConfigError::invalid(
        "min_log_AR/max_log_AR",
        format!("下界 {} 大于上界 {}", self.min_log_ar, self.max_log_ar),
      ));
    }
    if self.viewpoints.is_empty() {
      return Err(ConfigError::invalid("viewpoints", "白名单为空"));
    }
    if self.batch_size == 0 {
      return Err(ConfigError::invalid("batch_size", "必须至少为 1"));
    }
    for name in self.viewpoints.iter().filter(|v| !viewpoint::is_canonical(v.as_str())) {
      warn!("白名单中的视角 '{}' 不在规范词表中，只能匹配无法识别的原始标签", name);
    }
    Ok(())
  }

  pub fn allows_viewpoint(&self, viewpoint: &str) -> bool {
    self.viewpoints.contains(viewpoint)
  }
}
