//! Typed access to NetCDF attributes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded attribute value.
///
/// NetCDF has many numeric types; they are all widened to `f64` here since
/// attributes are only ever used as metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Texts(Vec<String>),
    Number(f64),
    Numbers(Vec<f64>),
}

impl AttrValue {
    /// The value as text. Single-element text lists are unwrapped.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            AttrValue::Texts(v) if v.len() == 1 => Some(v[0].as_str()),
            _ => None,
        }
    }

    /// The value as a number. Single-element lists are unwrapped and numeric
    /// text (`"27700"`) is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Numbers(v) if v.len() == 1 => Some(v[0]),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "{}", s),
            AttrValue::Texts(v) => write!(f, "{}", v.join(", ")),
            AttrValue::Number(n) => write!(f, "{}", n),
            AttrValue::Numbers(v) => {
                let parts: Vec<String> = v.iter().map(|n| n.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

/// Global attributes the UKCP18 files are known to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    Project,
    Scenario,
    Resolution,
    Domain,
    Frequency,
    Collection,
    Institution,
    InstitutionId,
    Title,
    Source,
    Version,
    EnsembleMember,
    PlotLabel,
    LabelUnits,
    Contact,
    References,
    CreationDate,
}

impl AttributeKey {
    pub const ALL: [AttributeKey; 17] = [
        AttributeKey::Project,
        AttributeKey::Scenario,
        AttributeKey::Resolution,
        AttributeKey::Domain,
        AttributeKey::Frequency,
        AttributeKey::Collection,
        AttributeKey::Institution,
        AttributeKey::InstitutionId,
        AttributeKey::Title,
        AttributeKey::Source,
        AttributeKey::Version,
        AttributeKey::EnsembleMember,
        AttributeKey::PlotLabel,
        AttributeKey::LabelUnits,
        AttributeKey::Contact,
        AttributeKey::References,
        AttributeKey::CreationDate,
    ];

    /// Attribute name as stored in the file.
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKey::Project => "project",
            AttributeKey::Scenario => "scenario",
            AttributeKey::Resolution => "resolution",
            AttributeKey::Domain => "domain",
            AttributeKey::Frequency => "frequency",
            AttributeKey::Collection => "collection",
            AttributeKey::Institution => "institution",
            AttributeKey::InstitutionId => "institution_id",
            AttributeKey::Title => "title",
            AttributeKey::Source => "source",
            AttributeKey::Version => "version",
            AttributeKey::EnsembleMember => "ensemble_member",
            AttributeKey::PlotLabel => "plot_label",
            AttributeKey::LabelUnits => "label_units",
            AttributeKey::Contact => "contact",
            AttributeKey::References => "references",
            AttributeKey::CreationDate => "creation_date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered attribute list of a file or variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    entries: Vec<(String, AttrValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing an existing one of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up any attribute by name.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: AttributeKey) -> Option<&str> {
        self.get(key.name()).and_then(AttrValue::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AttrValue::as_f64)
    }

    /// Text attribute by name, for configured fields outside the known key set.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_str)
    }

    /// Like [`get_str`](Self::get_str) but a missing or non-text value is a schema error.
    pub fn require_str(&self, key: AttributeKey) -> crate::NetCdfResult<&str> {
        self.get_str(key).ok_or_else(|| {
            crate::NetCdfError::Schema(format!("missing text attribute '{}'", key.name()))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, AttrValue)>>(iter: T) -> Self {
        let mut attrs = Attributes::new();
        for (name, value) in iter {
            attrs.insert(name, value);
        }
        attrs
    }
}

/// Convert a netcdf attribute value into an [`AttrValue`].
pub(crate) fn convert_attribute(value: netcdf::AttributeValue) -> Option<AttrValue> {
    use netcdf::AttributeValue as V;

    fn widen<T: Into<f64>>(v: Vec<T>) -> AttrValue {
        AttrValue::Numbers(v.into_iter().map(Into::into).collect())
    }

    let converted = match value {
        V::Str(s) => AttrValue::Text(s),
        V::Strs(v) => AttrValue::Texts(v),
        V::Double(n) => AttrValue::Number(n),
        V::Doubles(v) => AttrValue::Numbers(v),
        V::Float(n) => AttrValue::Number(n as f64),
        V::Floats(v) => widen(v),
        V::Int(n) => AttrValue::Number(n as f64),
        V::Ints(v) => widen(v),
        V::Uint(n) => AttrValue::Number(n as f64),
        V::Uints(v) => widen(v),
        V::Short(n) => AttrValue::Number(n as f64),
        V::Shorts(v) => widen(v),
        V::Ushort(n) => AttrValue::Number(n as f64),
        V::Ushorts(v) => widen(v),
        V::Schar(n) => AttrValue::Number(n as f64),
        V::Schars(v) => widen(v),
        V::Uchar(n) => AttrValue::Number(n as f64),
        V::Uchars(v) => widen(v),
        V::Longlong(n) => AttrValue::Number(n as f64),
        V::Longlongs(v) => AttrValue::Numbers(v.into_iter().map(|n| n as f64).collect()),
        V::Ulonglong(n) => AttrValue::Number(n as f64),
        V::Ulonglongs(v) => AttrValue::Numbers(v.into_iter().map(|n| n as f64).collect()),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(converted)
}
