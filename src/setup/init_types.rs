use serde::Deserialize;
use serde_json::Value;

/// One entry of the location list as stored on disk. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    #[serde(default)]
    pub loc_id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub long: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
}

impl LocationRecord {
    /// `loc_id` rendered as text; falls back to the title, then the raw position.
    pub fn identity(&self, position: usize) -> String {
        match &self.loc_id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
                _ => n.to_string(),
            },
            _ => self
                .title
                .clone()
                .unwrap_or_else(|| format!("#{position}")),
        }
    }
}
