use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{flag, integer, text_or, yes_no, UNNAMED};
use super::Resource;

/// A payment type (jenis pembayaran), e.g. cash or bank transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentType {
  pub id: Option<i64>,
  pub name: String,
  pub description: String,
  pub active: bool,
}

impl Resource for PaymentType {
  const NAME: &'static str = "payment_type";
  const PATH: &'static str = "jenis-pembayaran";
  const LABEL: &'static str = "Payment types";
  const COLUMNS: &'static [&'static str] = &["Name", "Description", "Active"];

  fn normalize(raw: &Value) -> Self {
    Self {
      id: integer(raw, &["id", "id_jenis_pembayaran"]),
      name: text_or(raw, &["name", "nama", "nama_jenis", "jenis_pembayaran"], UNNAMED),
      description: text_or(raw, &["description", "keterangan", "deskripsi"], ""),
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
      self.name.clone(),
      self.description.clone(),
      yes_no(self.active),
    ]
  }

  fn fields(&self) -> Vec<(&'static str, String)> {
    vec![
      ("ID", self.id.map(|id| id.to_string()).unwrap_or_default()),
      ("Name", self.name.clone()),
      ("Description", self.description.clone()),
      ("Active", yes_no(self.active)),
    ]
  }
}
