//! OSC type model and argument descriptors
//!
//! OSCQuery describes each method's arguments with an OSC type tag string
//! such as `"if[si]Nb"`. Brackets denote OSC arrays and may nest; every
//! other recognized character maps to one simple type.

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

/// A single OSC 1.0 type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    Int,
    Float,
    String,
    Blob,
    Int64,
    TimeTag,
    Double,
    Char,
    Rgba,
    Midi,
    True,
    False,
    Nil,
    Infinitum,
}

impl SimpleType {
    /// Map a type tag character to its type. `S` is an alias for `s`.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'i' => Some(SimpleType::Int),
            'f' => Some(SimpleType::Float),
            's' | 'S' => Some(SimpleType::String),
            'b' => Some(SimpleType::Blob),
            'h' => Some(SimpleType::Int64),
            't' => Some(SimpleType::TimeTag),
            'd' => Some(SimpleType::Double),
            'c' => Some(SimpleType::Char),
            'r' => Some(SimpleType::Rgba),
            'm' => Some(SimpleType::Midi),
            'T' => Some(SimpleType::True),
            'F' => Some(SimpleType::False),
            'N' => Some(SimpleType::Nil),
            'I' => Some(SimpleType::Infinitum),
            _ => None,
        }
    }

    /// The canonical tag character for this type
    pub fn tag(&self) -> char {
        match self {
            SimpleType::Int => 'i',
            SimpleType::Float => 'f',
            SimpleType::String => 's',
            SimpleType::Blob => 'b',
            SimpleType::Int64 => 'h',
            SimpleType::TimeTag => 't',
            SimpleType::Double => 'd',
            SimpleType::Char => 'c',
            SimpleType::Rgba => 'r',
            SimpleType::Midi => 'm',
            SimpleType::True => 'T',
            SimpleType::False => 'F',
            SimpleType::Nil => 'N',
            SimpleType::Infinitum => 'I',
        }
    }
}

impl std::fmt::Display for SimpleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// An argument type: a simple tag or a nested OSC array
#[derive(Debug, Clone, PartialEq)]
pub enum OscType {
    Simple(SimpleType),
    Array(Vec<OscType>),
}

impl From<SimpleType> for OscType {
    fn from(t: SimpleType) -> Self {
        OscType::Simple(t)
    }
}

/// Parse an OSC type tag string into a type sequence.
///
/// Linear scan with a bracket-depth counter: `[` at depth 0 opens a group,
/// its body is re-parsed recursively when the matching `]` closes it.
/// Unknown characters are silently dropped; an unbalanced `[` discards its
/// accumulated content.
pub fn parse_type_tag(tag: &str) -> Vec<OscType> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut nested = String::new();

    for c in tag.chars() {
        match c {
            '[' => {
                if depth > 0 {
                    nested.push(c);
                }
                depth += 1;
            }
            ']' => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    out.push(OscType::Array(parse_type_tag(&nested)));
                    nested.clear();
                } else {
                    nested.push(c);
                }
            }
            _ if depth > 0 => nested.push(c),
            _ => {
                if let Some(t) = SimpleType::from_tag(c) {
                    out.push(t.into());
                }
            }
        }
    }

    out
}

/// Reconstruct the type tag string for a type sequence (inverse of
/// [`parse_type_tag`] up to tag aliases).
pub fn type_tag(types: &[OscType]) -> String {
    let mut s = String::with_capacity(types.len());
    for t in types {
        push_tag(&mut s, t);
    }
    s
}

fn push_tag(s: &mut String, t: &OscType) {
    match t {
        OscType::Simple(st) => s.push(st.tag()),
        OscType::Array(inner) => {
            s.push('[');
            for t in inner {
                push_tag(s, t);
            }
            s.push(']');
        }
    }
}

/// Read/write policy of a node. Serialized as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Access {
    /// Pure container, no value
    NoValue = 0,
    ReadOnly = 1,
    WriteOnly = 2,
    ReadWrite = 3,
}

impl From<Access> for u8 {
    fn from(a: Access) -> u8 {
        a as u8
    }
}

impl TryFrom<u8> for Access {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Access::NoValue),
            1 => Ok(Access::ReadOnly),
            2 => Ok(Access::WriteOnly),
            3 => Ok(Access::ReadWrite),
            _ => Err(format!("invalid access value: {}", v)),
        }
    }
}

impl Access {
    /// Whether a value may be read through this node
    pub fn readable(&self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    /// Whether a value may be written through this node
    pub fn writable(&self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

/// Clipping behavior applied to out-of-range values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipMode {
    #[default]
    None,
    Low,
    High,
    Both,
}

/// Value domain of an argument.
///
/// Either min/max bounds with an optional enumeration of allowed values, or,
/// for array-typed arguments, a per-element sequence of ranges aligned with
/// the array's member types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Range {
    Bounds {
        #[serde(rename = "MIN", default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(rename = "MAX", default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(rename = "VALS", default, skip_serializing_if = "Option::is_none")]
        vals: Option<Vec<serde_json::Value>>,
    },
    PerElement(Vec<Option<Range>>),
}

impl Range {
    /// Bounds with both ends
    pub fn bounds(min: f64, max: f64) -> Self {
        Range::Bounds {
            min: Some(min),
            max: Some(max),
            vals: None,
        }
    }

    /// Lower bound only
    pub fn min(min: f64) -> Self {
        Range::Bounds {
            min: Some(min),
            max: None,
            vals: None,
        }
    }

    /// Upper bound only
    pub fn max(max: f64) -> Self {
        Range::Bounds {
            min: None,
            max: Some(max),
            vals: None,
        }
    }

    /// Enumerated allowed values
    pub fn vals(vals: Vec<serde_json::Value>) -> Self {
        Range::Bounds {
            min: None,
            max: None,
            vals: Some(vals),
        }
    }
}

/// A decoded OSC argument value.
///
/// JSON projection (used by the VALUE arrays of the wire shape): numbers for
/// the numeric variants, strings for `Str`/`Char`, `null` for `Nil` and
/// `Infinitum` (JSON has no infinity), byte arrays for `Blob`, and small
/// objects for `TimeTag`/`Rgba`/`Midi`.
#[derive(Debug, Clone, PartialEq)]
pub enum OscValue {
    Int(i32),
    Float(f32),
    Str(String),
    Blob(Vec<u8>),
    Long(i64),
    TimeTag { seconds: u32, fraction: u32 },
    Double(f64),
    Char(char),
    Rgba { r: u8, g: u8, b: u8, a: u8 },
    Midi { port: u8, status: u8, data1: u8, data2: u8 },
    Bool(bool),
    Nil,
    Infinitum,
}

impl Serialize for OscValue {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            OscValue::Int(v) => s.serialize_i32(*v),
            OscValue::Float(v) => s.serialize_f32(*v),
            OscValue::Str(v) => s.serialize_str(v),
            OscValue::Blob(v) => v.serialize(s),
            OscValue::Long(v) => s.serialize_i64(*v),
            OscValue::TimeTag { seconds, fraction } => {
                let mut st = s.serialize_struct("TimeTag", 2)?;
                st.serialize_field("seconds", seconds)?;
                st.serialize_field("fraction", fraction)?;
                st.end()
            }
            OscValue::Double(v) => s.serialize_f64(*v),
            OscValue::Char(v) => s.collect_str(v),
            OscValue::Rgba { r, g, b, a } => {
                let mut st = s.serialize_struct("Rgba", 4)?;
                st.serialize_field("r", r)?;
                st.serialize_field("g", g)?;
                st.serialize_field("b", b)?;
                st.serialize_field("a", a)?;
                st.end()
            }
            OscValue::Midi {
                port,
                status,
                data1,
                data2,
            } => {
                let mut st = s.serialize_struct("Midi", 4)?;
                st.serialize_field("port", port)?;
                st.serialize_field("status", status)?;
                st.serialize_field("data1", data1)?;
                st.serialize_field("data2", data2)?;
                st.end()
            }
            OscValue::Bool(v) => s.serialize_bool(*v),
            OscValue::Nil | OscValue::Infinitum => s.serialize_unit(),
        }
    }
}

impl OscValue {
    /// Convert to the JSON projection.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Type-directed conversion from the JSON projection, used when
    /// ingesting a remote tree. Returns `None` when the JSON value does not
    /// fit the declared type (including array types, which carry no single
    /// value slot in this revision).
    pub fn from_json(ty: &OscType, v: &serde_json::Value) -> Option<OscValue> {
        let st = match ty {
            OscType::Simple(st) => *st,
            OscType::Array(_) => return None,
        };
        match st {
            SimpleType::Int => json_i64(v).and_then(|n| i32::try_from(n).ok()).map(OscValue::Int),
            SimpleType::Float => v.as_f64().map(|f| OscValue::Float(f as f32)),
            SimpleType::String => v.as_str().map(|s| OscValue::Str(s.to_string())),
            SimpleType::Blob => {
                let arr = v.as_array()?;
                let mut bytes = Vec::with_capacity(arr.len());
                for e in arr {
                    bytes.push(u8::try_from(e.as_u64()?).ok()?);
                }
                Some(OscValue::Blob(bytes))
            }
            SimpleType::Int64 => json_i64(v).map(OscValue::Long),
            SimpleType::TimeTag => {
                let obj = v.as_object()?;
                Some(OscValue::TimeTag {
                    seconds: obj.get("seconds")?.as_u64()? as u32,
                    fraction: obj.get("fraction")?.as_u64()? as u32,
                })
            }
            SimpleType::Double => v.as_f64().map(OscValue::Double),
            SimpleType::Char => v.as_str().and_then(|s| s.chars().next()).map(OscValue::Char),
            SimpleType::Rgba => {
                let obj = v.as_object()?;
                Some(OscValue::Rgba {
                    r: obj.get("r")?.as_u64()? as u8,
                    g: obj.get("g")?.as_u64()? as u8,
                    b: obj.get("b")?.as_u64()? as u8,
                    a: obj.get("a")?.as_u64()? as u8,
                })
            }
            SimpleType::Midi => {
                let obj = v.as_object()?;
                Some(OscValue::Midi {
                    port: obj.get("port")?.as_u64()? as u8,
                    status: obj.get("status")?.as_u64()? as u8,
                    data1: obj.get("data1")?.as_u64()? as u8,
                    data2: obj.get("data2")?.as_u64()? as u8,
                })
            }
            SimpleType::True | SimpleType::False => v.as_bool().map(OscValue::Bool),
            SimpleType::Nil => Some(OscValue::Nil),
            SimpleType::Infinitum => Some(OscValue::Infinitum),
        }
    }

    /// Numeric selection rule of the OSC encoder: an exact integer within
    /// int32 range becomes `Int`, anything else `Float`.
    pub fn from_f64(n: f64) -> OscValue {
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
            OscValue::Int(n as i32)
        } else {
            OscValue::Float(n as f32)
        }
    }
}

fn json_i64(v: &serde_json::Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        let f = v.as_f64()?;
        (f.fract() == 0.0).then_some(f as i64)
    })
}

impl From<i32> for OscValue {
    fn from(v: i32) -> Self {
        OscValue::Int(v)
    }
}

impl From<f32> for OscValue {
    fn from(v: f32) -> Self {
        OscValue::Float(v)
    }
}

impl From<f64> for OscValue {
    fn from(v: f64) -> Self {
        OscValue::Double(v)
    }
}

impl From<bool> for OscValue {
    fn from(v: bool) -> Self {
        OscValue::Bool(v)
    }
}

impl From<&str> for OscValue {
    fn from(v: &str) -> Self {
        OscValue::Str(v.to_string())
    }
}

impl From<String> for OscValue {
    fn from(v: String) -> Self {
        OscValue::Str(v)
    }
}

/// One declared argument of a method node
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub osc_type: OscType,
    pub range: Option<Range>,
    pub clip_mode: Option<ClipMode>,
    pub value: Option<OscValue>,
}

impl Argument {
    pub fn new(osc_type: impl Into<OscType>) -> Self {
        Self {
            osc_type: osc_type.into(),
            range: None,
            clip_mode: None,
            value: None,
        }
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_clip_mode(mut self, clip_mode: ClipMode) -> Self {
        self.clip_mode = Some(clip_mode);
        self
    }

    pub fn with_value(mut self, value: impl Into<OscValue>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let types = parse_type_tag("if");
        assert_eq!(
            types,
            vec![
                OscType::Simple(SimpleType::Int),
                OscType::Simple(SimpleType::Float)
            ]
        );
    }

    #[test]
    fn test_parse_nested() {
        let types = parse_type_tag("if[si]Nb");
        assert_eq!(types.len(), 5);
        assert_eq!(
            types[2],
            OscType::Array(vec![
                OscType::Simple(SimpleType::String),
                OscType::Simple(SimpleType::Int)
            ])
        );
        assert_eq!(types[3], OscType::Simple(SimpleType::Nil));
        assert_eq!(types[4], OscType::Simple(SimpleType::Blob));
    }

    #[test]
    fn test_parse_deeply_nested() {
        let types = parse_type_tag("[i[fF]]");
        assert_eq!(
            types,
            vec![OscType::Array(vec![
                OscType::Simple(SimpleType::Int),
                OscType::Array(vec![
                    OscType::Simple(SimpleType::Float),
                    OscType::Simple(SimpleType::False)
                ])
            ])]
        );
    }

    #[test]
    fn test_parse_string_alias() {
        // 'S' is an alias for 's'; both reconstruct as 's'
        let types = parse_type_tag("sS");
        assert_eq!(types.len(), 2);
        assert_eq!(type_tag(&types), "ss");
    }

    #[test]
    fn test_parse_drops_unknown() {
        let types = parse_type_tag("i?f!");
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn test_parse_unbalanced_open_discards() {
        // '[si' never closes, so its content is discarded
        let types = parse_type_tag("f[si");
        assert_eq!(types, vec![OscType::Simple(SimpleType::Float)]);
    }

    #[test]
    fn test_parse_stray_close_dropped() {
        let types = parse_type_tag("]i");
        assert_eq!(types, vec![OscType::Simple(SimpleType::Int)]);
    }

    #[test]
    fn test_type_tag_roundtrip() {
        for tag in ["i", "if", "s[iF]", "[i[fF]]b", "htdcrmTFNI"] {
            assert_eq!(type_tag(&parse_type_tag(tag)), *tag);
        }
    }

    #[test]
    fn test_access_serde() {
        assert_eq!(serde_json::to_string(&Access::ReadWrite).unwrap(), "3");
        let a: Access = serde_json::from_str("1").unwrap();
        assert_eq!(a, Access::ReadOnly);
        assert!(serde_json::from_str::<Access>("9").is_err());
    }

    #[test]
    fn test_clip_mode_serde() {
        assert_eq!(serde_json::to_string(&ClipMode::Both).unwrap(), "\"both\"");
        let c: ClipMode = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(c, ClipMode::Low);
    }

    #[test]
    fn test_range_serde_bounds() {
        let r = Range::bounds(0.0, 100.0);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({"MIN": 0.0, "MAX": 100.0}));
        let back: Range = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_range_serde_per_element() {
        let r = Range::PerElement(vec![Some(Range::min(-100.0)), None]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!([{"MIN": -100.0}, null]));
    }

    #[test]
    fn test_value_json_projection() {
        assert_eq!(OscValue::Int(4).to_json(), serde_json::json!(4));
        assert_eq!(OscValue::Bool(true).to_json(), serde_json::json!(true));
        assert_eq!(OscValue::Nil.to_json(), serde_json::Value::Null);
        assert_eq!(OscValue::Infinitum.to_json(), serde_json::Value::Null);
        assert_eq!(
            OscValue::TimeTag {
                seconds: 1,
                fraction: 2
            }
            .to_json(),
            serde_json::json!({"seconds": 1, "fraction": 2})
        );
        assert_eq!(
            OscValue::Rgba {
                r: 255,
                g: 0,
                b: 0,
                a: 255
            }
            .to_json(),
            serde_json::json!({"r": 255, "g": 0, "b": 0, "a": 255})
        );
    }

    #[test]
    fn test_value_from_json_typed() {
        let ty = OscType::Simple(SimpleType::Float);
        assert_eq!(
            OscValue::from_json(&ty, &serde_json::json!(0.5)),
            Some(OscValue::Float(0.5))
        );

        let ty = OscType::Simple(SimpleType::Int);
        assert_eq!(
            OscValue::from_json(&ty, &serde_json::json!(7)),
            Some(OscValue::Int(7))
        );
        assert_eq!(OscValue::from_json(&ty, &serde_json::json!("x")), None);

        let ty = OscType::Array(vec![OscType::Simple(SimpleType::Int)]);
        assert_eq!(OscValue::from_json(&ty, &serde_json::json!(1)), None);
    }

    #[test]
    fn test_numeric_selection() {
        assert_eq!(OscValue::from_f64(4.0), OscValue::Int(4));
        assert_eq!(OscValue::from_f64(3.5), OscValue::Float(3.5));
        assert_eq!(
            OscValue::from_f64(4_000_000_000.0),
            OscValue::Float(4_000_000_000.0)
        );
    }
}
