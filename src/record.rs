// 该文件是 Huji （户籍） 项目的一部分。
// src/record.rs - 检测记录定义
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
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::viewpoint;

/// 轴对齐边界框，左上角坐标加宽高
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
  pub x: f64,
  pub y: f64,
  pub w: f64,
  pub h: f64,
}

impl BBox {
  pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
    Self { x, y, w, h }
  }

  /// [x_min, y_min, x_max, y_max]
  pub fn xyxy(&self) -> [f64; 4] {
    [self.x, self.y, self.x + self.w, self.y + self.h]
  }

  pub fn area(&self) -> f64 {
    self.w.max(0.0) * self.h.max(0.0)
  }

  /// 计算两个边界框的 IoU，不相交或并集为空时为 0
  pub fn iou(&self, other: &BBox) -> f64 {
    let [ax1, ay1, ax2, ay2] = self.xyxy();
    let [bx1, by1, bx2, by2] = other.xyxy();

    let x1 = ax1.max(bx1);
    let y1 = ay1.max(by1);
    let x2 = ax2.min(bx2);
    let y2 = ay2.min(by2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
  }
}

/// 二分类概率向量 {负类, 正类}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Softmax {
  pub negative: f64,
  pub positive: f64,
}

impl Softmax {
  pub fn new(negative: f64, positive: f64) -> Self {
    Self { negative, positive }
  }

  /// 数值稳定的 softmax
  pub fn from_logits(logits: [f64; 2]) -> Self {
    let max = logits[0].max(logits[1]);
    let e0 = (logits[0] - max).exp();
    let e1 = (logits[1] - max).exp();
    let sum = e0 + e1;
    Self {
      negative: e0 / sum,
      positive: e1 / sum,
    }
  }

  /// 两个分量都在 [0, 1] 内且和为 1（容差 `tolerance`）
  pub fn is_valid(&self, tolerance: f64) -> bool {
    let in_range = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
    in_range(self.negative)
      && in_range(self.positive)
      && (self.negative + self.positive - 1.0).abs() <= tolerance
  }
}

/// 记录的最终去向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fate {
  /// 通过全部阶段，作为普查标注
  Admitted,
  /// 置信度不高于阈值
  BelowThreshold,
  /// 对数宽高比超出窗口
  AspectRatio,
  /// 同图中被更高置信度的框抑制
  Duplicate,
  /// 缺少几何信息、视角或物种不符
  Inadmissible,
}

impl Fate {
  pub fn as_str(&self) -> &'static str {
    match self {
      Fate::Admitted => "admitted",
      Fate::BelowThreshold => "below_threshold",
      Fate::AspectRatio => "aspect_ratio",
      Fate::Duplicate => "duplicate",
      Fate::Inadmissible => "inadmissible",
    }
  }
}

impl fmt::Display for Fate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for Fate {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

/// 输出行中由流水线写入的列，同名的透传列会被丢弃
pub const RESERVED_OUTPUT_KEYS: [&str; 10] = [
  "image fname",
  "bbox x",
  "bbox y",
  "bbox w",
  "bbox h",
  "predicted_viewpoint",
  "annot species",
  "CA_score",
  "annotations_census",
  "census_fate",
];

/// 中间结果列，不写入输出
pub const TRANSIENT_KEYS: [&str; 2] = ["softmax_output_0", "log_AR"];

/// 输入行，字段名沿用上游视角预测输出的列名
///
/// 其它列（包括 `viewpoint`、`species` 等同义列）一律透传。
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
  #[serde(rename = "image fname")]
  pub image_id: String,
  #[serde(rename = "bbox x", default)]
  pub bbox_x: Option<f64>,
  #[serde(rename = "bbox y", default)]
  pub bbox_y: Option<f64>,
  #[serde(rename = "bbox w", default)]
  pub bbox_w: Option<f64>,
  #[serde(rename = "bbox h", default)]
  pub bbox_h: Option<f64>,
  #[serde(rename = "predicted_viewpoint", default)]
  pub viewpoint: Option<String>,
  #[serde(rename = "annot species", default)]
  pub species: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// 一个检测框提议及其在流水线中累积的字段
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
  /// 在输入中的位置
  pub index: usize,
  pub image_id: String,
  pub bbox_x: Option<f64>,
  pub bbox_y: Option<f64>,
  pub bbox_w: Option<f64>,
  pub bbox_h: Option<f64>,
  pub raw_viewpoint: String,
  pub canonical_viewpoint: String,
  pub species_label: Option<String>,
  /// 分类器输出，未计算时为 None
  pub confidence: Option<Softmax>,
  /// 形状过滤阶段的临时字段
  pub log_ar: Option<f64>,
  /// 原样透传的其它列
  pub extra: Map<String, Value>,
}

impl DetectionRecord {
  pub fn new(index: usize, image_id: impl Into<String>, bbox: BBox, raw_viewpoint: impl Into<String>) -> Self {
    let raw_viewpoint = raw_viewpoint.into();
    let canonical_viewpoint = viewpoint::normalize(&raw_viewpoint).to_string();
    Self {
      index,
      image_id: image_id.into(),
      bbox_x: Some(bbox.x),
      bbox_y: Some(bbox.y),
      bbox_w: Some(bbox.w),
      bbox_h: Some(bbox.h),
      raw_viewpoint,
      canonical_viewpoint,
      species_label: None,
      confidence: None,
      log_ar: None,
      extra: Map::new(),
    }
  }

  pub fn from_raw(index: usize, raw: RawRecord) -> Self {
    let raw_viewpoint = raw.viewpoint.unwrap_or_default();
    let canonical_viewpoint = viewpoint::normalize(&raw_viewpoint).to_string();
    Self {
      index,
      image_id: raw.image_id,
      bbox_x: raw.bbox_x,
      bbox_y: raw.bbox_y,
      bbox_w: raw.bbox_w,
      bbox_h: raw.bbox_h,
      raw_viewpoint,
      canonical_viewpoint,
      species_label: raw.species,
      confidence: None,
      log_ar: None,
      extra: raw.extra,
    }
  }

  pub fn with_species(mut self, species: impl Into<String>) -> Self {
    self.species_label = Some(species.into());
    self
  }

  pub fn with_bbox_fields(mut self, fields: [Option<f64>; 4]) -> Self {
    let [x, y, w, h] = fields;
    self.bbox_x = x;
    self.bbox_y = y;
    self.bbox_w = w;
    self.bbox_h = h;
    self
  }

  pub fn with_confidence(mut self, confidence: Softmax) -> Self {
    self.confidence = Some(confidence);
    self
  }

  pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
    self.extra.insert(key.into(), value);
    self
  }

  /// 四个字段都存在且有限时返回边界框
  pub fn bbox(&self) -> Option<BBox> {
    let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
    Some(BBox::new(
      finite(self.bbox_x)?,
      finite(self.bbox_y)?,
      finite(self.bbox_w)?,
      finite(self.bbox_h)?,
    ))
  }

  pub fn positive_confidence(&self) -> Option<f64> {
    self.confidence.map(|c| c.positive)
  }

  /// 去掉临时字段，生成对外的普查标注
  pub fn into_annotation(mut self, fate: Fate) -> CensusAnnotation {
    for key in RESERVED_OUTPUT_KEYS.iter().chain(TRANSIENT_KEYS.iter()) {
      self.extra.remove(*key);
    }
    CensusAnnotation {
      index: self.index,
      image_id: self.image_id,
      bbox_x: self.bbox_x,
      bbox_y: self.bbox_y,
      bbox_w: self.bbox_w,
      bbox_h: self.bbox_h,
      viewpoint: self.canonical_viewpoint,
      species: self.species_label,
      ca_score: self.confidence.map(|c| c.positive),
      admitted: fate == Fate::Admitted,
      fate,
      extra: self.extra,
    }
  }
}

/// 一批记录，以及数据集是否带有物种真值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
  pub records: Vec<DetectionRecord>,
  pub species_labelled: bool,
}

impl Dataset {
  /// 任一记录带物种标签即视为带真值的数据集
  pub fn new(records: Vec<DetectionRecord>) -> Self {
    let species_labelled = records.iter().any(|r| r.species_label.is_some());
    Self {
      records,
      species_labelled,
    }
  }

  pub fn with_species_labelled(mut self, species_labelled: bool) -> Self {
    self.species_labelled = species_labelled;
    self
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

/// 输出行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CensusAnnotation {
  #[serde(skip)]
  pub index: usize,
  #[serde(rename = "image fname")]
  pub image_id: String,
  #[serde(rename = "bbox x")]
  pub bbox_x: Option<f64>,
  #[serde(rename = "bbox y")]
  pub bbox_y: Option<f64>,
  #[serde(rename = "bbox w")]
  pub bbox_w: Option<f64>,
  #[serde(rename = "bbox h")]
  pub bbox_h: Option<f64>,
  /// 规范化之后的视角
  #[serde(rename = "predicted_viewpoint")]
  pub viewpoint: String,
  #[serde(rename = "annot species", skip_serializing_if = "Option::is_none")]
  pub species: Option<String>,
  #[serde(rename = "CA_score")]
  pub ca_score: Option<f64>,
  #[serde(rename = "annotations_census")]
  pub admitted: bool,
  #[serde(rename = "census_fate")]
  pub fate: Fate,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// 各分区的记录数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CensusSummary {
  pub input: usize,
  pub admitted: usize,
  pub below_threshold: usize,
  pub aspect_ratio: usize,
  pub duplicate: usize,
  pub inadmissible: usize,
}

impl CensusSummary {
  pub fn total(&self) -> usize {
    self.admitted + self.below_threshold + self.aspect_ratio + self.duplicate + self.inadmissible
  }
}

/// 流水线最终结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusResult {
  pub annotations: Vec<CensusAnnotation>,
  pub summary: CensusSummary,
}

impl CensusResult {
  pub fn admitted(&self) -> impl Iterator<Item = &CensusAnnotation> {
    self.annotations.iter().filter(|a| a.admitted)
  }

  /// 每张图像中被采纳的普查标注数量
  pub fn admitted_per_image(&self) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for annotation in self.admitted() {
      *counts.entry(annotation.image_id.as_str()).or_insert(0) += 1;
    }
    counts
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use serde_json::json;

  use super::*;

  #[test]
  fn iou_of_shifted_boxes() {
    let a = BBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BBox::new(1.0, 1.0, 10.0, 10.0);
    assert_relative_eq!(a.iou(&b), 81.0 / 119.0, epsilon = 1e-12);
    assert_relative_eq!(a.iou(&b), b.iou(&a), epsilon = 1e-12);
  }

  #[test]
  fn iou_of_disjoint_and_touching_boxes_is_zero() {
    let a = BBox::new(0.0, 0.0, 10.0, 10.0);
    assert_eq!(a.iou(&BBox::new(50.0, 50.0, 10.0, 10.0)), 0.0);
    assert_eq!(a.iou(&BBox::new(10.0, 0.0, 10.0, 10.0)), 0.0);
    assert_eq!(BBox::new(0.0, 0.0, 0.0, 0.0).iou(&BBox::new(0.0, 0.0, 0.0, 0.0)), 0.0);
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = BBox::new(3.0, 4.0, 5.0, 6.0);
    assert_relative_eq!(a.iou(&a), 1.0);
  }

  #[test]
  fn softmax_from_logits_sums_to_one() {
    let s = Softmax::from_logits([0.0, 0.0]);
    assert_relative_eq!(s.negative, 0.5);
    assert_relative_eq!(s.positive, 0.5);

    let s = Softmax::from_logits([1000.0, 1002.0]);
    assert!(s.is_valid(1e-9));
    assert!(s.positive > s.negative);
  }

  #[test]
  fn softmax_validity() {
    assert!(Softmax::new(0.3, 0.7).is_valid(1e-6));
    assert!(!Softmax::new(0.5, 0.7).is_valid(1e-6));
    assert!(!Softmax::new(f64::NAN, 1.0).is_valid(1e-6));
    assert!(!Softmax::new(-0.5, 1.5).is_valid(1e-6));
  }

  #[test]
  fn bbox_requires_all_finite_fields() {
    let record = DetectionRecord::new(0, "a.jpg", BBox::new(1.0, 2.0, 3.0, 4.0), "left");
    assert_eq!(record.bbox(), Some(BBox::new(1.0, 2.0, 3.0, 4.0)));

    let missing = record.clone().with_bbox_fields([Some(1.0), None, Some(3.0), Some(4.0)]);
    assert_eq!(missing.bbox(), None);

    let nan = record.with_bbox_fields([Some(1.0), Some(2.0), Some(f64::NAN), Some(4.0)]);
    assert_eq!(nan.bbox(), None);
  }

  #[test]
  fn raw_record_accepts_upstream_column_names() {
    let value = json!({
      "image fname": "img_001.jpg",
      "bbox x": 10,
      "bbox y": 20.5,
      "bbox w": 30,
      "bbox h": null,
      "predicted_viewpoint": "frontright_highres",
      "annot species": "grevy",
      "annot_uuid": "abc",
    });
    let raw: RawRecord = serde_json::from_value(value).unwrap();
    let record = DetectionRecord::from_raw(7, raw);

    assert_eq!(record.index, 7);
    assert_eq!(record.image_id, "img_001.jpg");
    assert_eq!(record.bbox_x, Some(10.0));
    assert_eq!(record.bbox_h, None);
    assert_eq!(record.raw_viewpoint, "frontright_highres");
    assert_eq!(record.canonical_viewpoint, "frontright");
    assert_eq!(record.species_label.as_deref(), Some("grevy"));
    assert_eq!(record.extra.get("annot_uuid"), Some(&json!("abc")));
  }

  #[test]
  fn annotation_drops_transient_fields() {
    let mut record = DetectionRecord::new(0, "a.jpg", BBox::new(0.0, 0.0, 20.0, 10.0), "right")
      .with_confidence(Softmax::new(0.1, 0.9))
      .with_extra("annot_uuid", json!("u-1"));
    record.log_ar = Some(2.0f64.ln());

    let annotation = record.into_annotation(Fate::Admitted);
    let value = serde_json::to_value(&annotation).unwrap();

    assert_eq!(value["CA_score"], json!(0.9));
    assert_eq!(value["annotations_census"], json!(true));
    assert_eq!(value["census_fate"], json!("admitted"));
    assert_eq!(value["annot_uuid"], json!("u-1"));
    assert!(value.get("log_AR").is_none());
    assert!(value.get("softmax_output_0").is_none());
    assert!(value.get("annot species").is_none());
  }

  #[test]
  fn stale_output_columns_are_replaced() {
    // 重新处理上一次的输出文件时，旧的结果列出现在透传列中
    let record = DetectionRecord::new(0, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), "left")
      .with_confidence(Softmax::new(0.1, 0.9))
      .with_extra("CA_score", json!(0.2))
      .with_extra("annotations_census", json!(false))
      .with_extra("census_fate", json!("below_threshold"))
      .with_extra("softmax_output_0", json!(0.8))
      .with_extra("log_AR", json!(0.0));

    let text = serde_json::to_string(&record.into_annotation(Fate::Admitted)).unwrap();
    assert_eq!(text.matches("\"CA_score\"").count(), 1);
    assert_eq!(text.matches("\"annotations_census\"").count(), 1);
    assert_eq!(text.matches("\"census_fate\"").count(), 1);

    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["CA_score"], json!(0.9));
    assert_eq!(value["annotations_census"], json!(true));
    assert_eq!(value["census_fate"], json!("admitted"));
    assert!(value.get("softmax_output_0").is_none());
    assert!(value.get("log_AR").is_none());
  }

  #[test]
  fn synonym_columns_pass_through() {
    let value = json!({
      "image fname": "img_001.jpg",
      "predicted_viewpoint": "left",
      "viewpoint": "right",
      "annot species": "grevy",
      "species": "plains",
    });
    let raw: RawRecord = serde_json::from_value(value).unwrap();
    let record = DetectionRecord::from_raw(0, raw);

    assert_eq!(record.canonical_viewpoint, "left");
    assert_eq!(record.species_label.as_deref(), Some("grevy"));
    assert_eq!(record.extra.get("viewpoint"), Some(&json!("right")));
    assert_eq!(record.extra.get("species"), Some(&json!("plains")));
  }

  #[test]
  fn fate_names_agree() {
    for fate in [
      Fate::Admitted,
      Fate::BelowThreshold,
      Fate::AspectRatio,
      Fate::Duplicate,
      Fate::Inadmissible,
    ] {
      assert_eq!(serde_json::to_value(fate).unwrap(), json!(fate.to_string()));
    }
  }

  #[test]
  fn dataset_detects_species_labels() {
    let plain = DetectionRecord::new(0, "a.jpg", BBox::new(0.0, 0.0, 1.0, 1.0), "left");
    assert!(!Dataset::new(vec![plain.clone()]).species_labelled);
    let labelled = plain.clone().with_species("zebra");
    assert!(Dataset::new(vec![plain, labelled]).species_labelled);
  }
}
