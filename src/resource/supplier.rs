use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{integer, text_or, UNNAMED};
use super::Resource;

/// A livestock supplier (pemasok).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
  pub id: Option<i64>,
  pub name: String,
  pub phone: String,
  pub address: String,
}

impl Resource for Supplier {
  const NAME: &'static str = "supplier";
  const PATH: &'static str = "supplier";
  const LABEL: &'static str = "Suppliers";
  const COLUMNS: &'static [&'static str] = &["Name", "Phone", "Address"];

  fn normalize(raw: &Value) -> Self {
    Self {
      id: integer(raw, &["id", "id_supplier", "id_pemasok"]),
      name: text_or(
        raw,
        &["name", "nama", "nama_supplier", "nama_pemasok"],
        UNNAMED,
      ),
      phone: text_or(raw, &["phone", "telepon", "no_hp", "no_telp"], "-"),
      address: text_or(raw, &["address", "alamat"], "-"),
    }
  }

  fn id(&self) -> Option<i64> {
    self.id
  }

  fn title(&self) -> &str {
    &self.name
  }

  fn cells(&self) -> Vec<String> {
    vec![self.name.clone(), self.phone.clone(), self.address.clone()]
  }

  fn fields(&self) -> Vec<(&'static str, String)> {
    vec![
      ("ID", self.id.map(|id| id.to_string()).unwrap_or_default()),
      ("Name", self.name.clone()),
      ("Phone", self.phone.clone()),
      ("Address", self.address.clone()),
    ]
  }
}
