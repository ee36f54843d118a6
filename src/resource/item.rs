use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{decimal, flag, format_number, integer, text_or, yes_no, UNNAMED};
use super::Resource;

/// A stock item (barang).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  pub id: Option<i64>,
  pub code: String,
  pub name: String,
  pub unit: String,
  pub price: f64,
  pub stock: f64,
  pub active: bool,
}

impl Resource for Item {
  const NAME: &'static str = "item";
  const PATH: &'static str = "barang";
  const LABEL: &'static str = "Items";
  const COLUMNS: &'static [&'static str] = &["Code", "Name", "Unit", "Price", "Stock", "Active"];

  fn normalize(raw: &Value) -> Self {
    Self {
      id: integer(raw, &["id", "id_barang"]),
      code: text_or(raw, &["code", "kode", "kode_barang"], "-"),
      name: text_or(raw, &["name", "nama", "nama_barang"], UNNAMED),
      unit: text_or(raw, &["unit", "satuan"], "-"),
      price: decimal(raw, &["price", "harga", "harga_jual"]),
      stock: decimal(raw, &["stock", "stok"]),
      active: flag(raw, &["active", "is_active", "aktif", "status"], true),
    }
  }

  fn id(&self) -> Option<i64> {
    self.id
  }

  fn title(&self) -> &str {
    &self.name
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.code.clone(),
      self.name.clone(),
      self.unit.clone(),
      format_number(self.price),
      format_number(self.stock),
      yes_no(self.active),
    ]
  }

  fn fields(&self) -> Vec<(&'static str, String)> {
    vec![
      ("ID", self.id.map(|id| id.to_string()).unwrap_or_default()),
      ("Code", self.code.clone()),
      ("Name", self.name.clone()),
      ("Unit", self.unit.clone()),
      ("Price", format_number(self.price)),
      ("Stock", format_number(self.stock)),
      ("Active", yes_no(self.active)),
    ]
  }
}
