// 该文件是 Huji （户籍） 项目的一部分。
// src/classifier/crop.rs - 裁剪图块并交给模型推理
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

use std::collections::HashMap;
use std::path::PathBuf;

use image::{ImageReader, RgbImage, imageops};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  classifier::Classifier,
  model::{BinaryLogits, Model, PATCH_HEIGHT, PATCH_WIDTH},
  record::{BBox, DetectionRecord, Softmax},
  viewpoint,
};

#[derive(Error, Debug)]
pub enum CropError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("记录 {index} 缺少边界框")]
  MissingBBox { index: usize },
  #[error("边界框 {bbox:?} 与 {width}x{height} 图像没有交集")]
  EmptyCrop { bbox: BBox, width: u32, height: u32 },
  #[error("模型推理错误: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 按 xyxy 裁剪（坐标截断为整数像素并限制在图像内），
/// 朝左时水平翻转，再缩放到 `size`
pub fn crop_patch(image: &RgbImage, bbox: &BBox, mirror: bool, size: (u32, u32)) -> Result<RgbImage, CropError> {
  let (width, height) = image.dimensions();
  let [x1, y1, x2, y2] = bbox.xyxy();
  let clamp = |v: f64, max: u32| (v.trunc().max(0.0) as u32).min(max);

  let (left, top) = (clamp(x1, width), clamp(y1, height));
  let (right, bottom) = (clamp(x2, width), clamp(y2, height));
  if right <= left || bottom <= top {
    return Err(CropError::EmptyCrop {
      bbox: *bbox,
      width,
      height,
    });
  }

  let mut patch = imageops::crop_imm(image, left, top, right - left, bottom - top).to_image();
  if mirror {
    patch = imageops::flip_horizontal(&patch);
  }

  let (w, h) = size;
  Ok(imageops::resize(&patch, w, h, imageops::FilterType::Triangle))
}

/// 从图像目录加载原图，裁剪出检测框后调用模型
pub struct CropClassifier<M> {
  image_dir: PathBuf,
  model: M,
  patch_size: (u32, u32),
}

impl<M> CropClassifier<M> {
  pub fn new(image_dir: impl Into<PathBuf>, model: M) -> Self {
    Self {
      image_dir: image_dir.into(),
      model,
      patch_size: (PATCH_WIDTH, PATCH_HEIGHT),
    }
  }

  pub fn with_patch_size(mut self, width: u32, height: u32) -> Self {
    self.patch_size = (width, height);
    self
  }

  fn load_image(&self, image_id: &str) -> Result<RgbImage, CropError> {
    let path = self.image_dir.join(image_id);
    debug!("加载图像: {}", path.display());
    let image = ImageReader::open(&path)?.decode()?;
    Ok(image.to_rgb8())
  }

  fn patch_from(&self, image: &RgbImage, record: &DetectionRecord) -> Result<RgbImage, CropError> {
    let bbox = record
      .bbox()
      .ok_or(CropError::MissingBBox { index: record.index })?;
    let mirror = viewpoint::is_left_facing(&record.canonical_viewpoint);
    crop_patch(image, &bbox, mirror, self.patch_size)
  }

  pub fn load_patch(&self, record: &DetectionRecord) -> Result<RgbImage, CropError> {
    let image = self.load_image(&record.image_id)?;
    self.patch_from(&image, record)
  }
}

impl<M> CropClassifier<M>
where
  M: Model<Input = RgbImage, Output = BinaryLogits>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  fn infer(&self, patch: &RgbImage) -> Result<Softmax, CropError> {
    let logits = self.model.infer(patch).map_err(|e| {
      error!("模型推理失败: {}", e);
      CropError::Model(Box::new(e))
    })?;
    Ok(Softmax::from_logits(logits))
  }
}

impl<M> Classifier for CropClassifier<M>
where
  M: Model<Input = RgbImage, Output = BinaryLogits>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = CropError;

  fn classify(&self, record: &DetectionRecord) -> Result<Softmax, Self::Error> {
    let patch = self.load_patch(record)?;
    self.infer(&patch)
  }

  /// 同一批次中的同一张图像只解码一次
  fn classify_batch(&self, batch: &[&DetectionRecord]) -> Result<Vec<Softmax>, Self::Error> {
    let mut images: HashMap<&str, RgbImage> = HashMap::new();
    let mut outputs = Vec::with_capacity(batch.len());
    for record in batch {
      let image = match images.entry(record.image_id.as_str()) {
        std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
        std::collections::hash_map::Entry::Vacant(entry) => entry.insert(self.load_image(&record.image_id)?),
      };
      let patch = self.patch_from(image, record)?;
      outputs.push(self.infer(&patch)?);
    }
    Ok(outputs)
  }
}
