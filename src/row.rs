use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single cell value. Dynamic columns and row patches are maps from
/// column id to one of these.
///
/// The untagged representation keeps persisted rows and exported JSON flat:
/// `null`, `true`, `3.5`, `"text"` or `["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl CellValue {
    pub fn is_list(&self) -> bool {
        matches!(self, CellValue::List(_))
    }

    /// Flat textual form used by the delimited-text codec. Lists are
    /// comma-joined, `Null` renders empty.
    pub fn render(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::List(items) => items.join(","),
        }
    }
}

/// The six fixed statistics. Each is independently editable and never
/// negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub special_attack: i64,
    pub special_defense: i64,
    pub speed: i64,
}

pub const STAT_NAMES: [&str; 6] = [
    "hp",
    "attack",
    "defense",
    "special_attack",
    "special_defense",
    "speed",
];

impl Stats {
    pub fn get(&self, name: &str) -> Option<i64> {
        match name {
            "hp" => Some(self.hp),
            "attack" => Some(self.attack),
            "defense" => Some(self.defense),
            "special_attack" => Some(self.special_attack),
            "special_defense" => Some(self.special_defense),
            "speed" => Some(self.speed),
            _ => None,
        }
    }

    /// Returns `false` for an unknown stat name. Values clamp at zero.
    pub fn set(&mut self, name: &str, value: i64) -> bool {
        let slot = match name {
            "hp" => &mut self.hp,
            "attack" => &mut self.attack,
            "defense" => &mut self.defense,
            "special_attack" => &mut self.special_attack,
            "special_defense" => &mut self.special_defense,
            "speed" => &mut self.speed,
            _ => return false,
        };
        *slot = value.max(0);
        true
    }
}

/// One dataset record: the fixed descriptive and numeric fields plus the
/// open-ended dynamic-field bag keyed by registered column id.
///
/// `id` is process-assigned and immutable; `source_key` is the remote
/// catalog's own number and only used for display and sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub source_key: i64,
    pub name: String,
    pub sprite: Option<String>,
    pub categories: Vec<String>,
    pub generation: i64,
    pub abilities: Vec<String>,
    #[serde(flatten)]
    pub stats: Stats,
    #[serde(default)]
    pub extra: IndexMap<String, CellValue>,
}

impl Row {
    pub fn fresh_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Field-level merge of a patch onto this row. Keys naming fixed fields
    /// update them when the value type fits; anything else lands in the
    /// dynamic bag. Type mismatches on fixed fields are dropped silently.
    pub fn apply_patch(&mut self, patch: &IndexMap<String, CellValue>) {
        for (key, value) in patch {
            if self.patch_fixed(key, value) {
                continue;
            }
            self.extra.insert(key.clone(), value.clone());
        }
    }

    fn patch_fixed(&mut self, key: &str, value: &CellValue) -> bool {
        match (key, value) {
            ("name", CellValue::Text(name)) => {
                self.name = name.clone();
                true
            }
            ("sprite", CellValue::Text(sprite)) => {
                self.sprite = Some(sprite.clone());
                true
            }
            ("sprite", CellValue::Null) => {
                self.sprite = None;
                true
            }
            ("generation", CellValue::Number(n)) => {
                self.generation = *n as i64;
                true
            }
            ("categories", CellValue::List(items)) => {
                self.categories = items.clone();
                true
            }
            ("abilities", CellValue::List(items)) => {
                self.abilities = items.clone();
                true
            }
            (stat, CellValue::Number(n)) if STAT_NAMES.contains(&stat) => {
                self.stats.set(stat, *n as i64)
            }
            // Fixed-field key with a value of the wrong shape: drop it
            // rather than let it shadow the field from the dynamic bag.
            (fixed, _) if Self::is_fixed_field(fixed) => true,
            _ => false,
        }
    }

    pub fn is_fixed_field(name: &str) -> bool {
        matches!(
            name,
            "id" | "source_key"
                | "name"
                | "sprite"
                | "categories"
                | "generation"
                | "abilities"
        ) || STAT_NAMES.contains(&name)
    }
}
