//! Native attribute values and the plain-JSON boundary.
//!
//! `Value` is the in-memory representation of a plug's data: strongly typed,
//! with glam vectors and matrices for the math-bearing tags and unit wrappers
//! for distance/angle/time. Records exchange values as *plain* JSON
//! (`serde_json::Value`) via [`Value::to_plain`] and [`Value::from_plain`]:
//! unit wrappers flatten to their internal value (angles are always radians),
//! matrices to a flat 16-element row list, vectors to plain lists.

use serde_json::json;

use crate::attr::AttrType;
use crate::util::math::{DMat4, DVec3, DVec4, IVec3, Vec3};
use crate::util::{Error, Result};

/// A linear distance, stored in the scene's working unit.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Distance(pub f64);

/// An angle, stored internally in radians.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Angle {
    radians: f64,
}

impl Angle {
    pub fn from_radians(radians: f64) -> Self {
        Self { radians }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self {
            radians: degrees.to_radians(),
        }
    }

    pub fn radians(&self) -> f64 {
        self.radians
    }

    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }
}

/// A point in time, stored in the scene's working time unit.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Time(pub f64);

/// A native attribute value.
///
/// One variant per value-bearing [`AttrType`] tag. `Message` doubles as the
/// placeholder for plugs that carry no data (message and compound parents).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// No data; identity-only plug.
    Message,
    Bool(bool),
    Byte(u8),
    Char(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Addr(u64),
    Float(f32),
    Double(f64),
    Double2([f64; 2]),
    Double3(DVec3),
    Double4(DVec4),
    Float2([f32; 2]),
    Float3(Vec3),
    Int2([i32; 2]),
    Int3(IVec3),
    Long2([i64; 2]),
    Long3([i64; 3]),
    Short2([i16; 2]),
    Short3([i16; 3]),
    Enum(i32),
    String(String),
    Distance(Distance),
    Angle(Angle),
    Time(Time),
    Matrix(DMat4),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    IntArray(Vec<i32>),
    PointArray(Vec<DVec4>),
    VectorArray(Vec<DVec3>),
    StringArray(Vec<String>),
    MatrixArray(Vec<DMat4>),
}

impl AttrType {
    /// The zero/empty default for this type.
    pub fn default_value(&self) -> Value {
        use AttrType as T;
        match self {
            T::Bool => Value::Bool(false),
            T::Byte => Value::Byte(0),
            T::Char => Value::Char(0),
            T::Short => Value::Short(0),
            T::Int => Value::Int(0),
            T::Long => Value::Long(0),
            T::Addr => Value::Addr(0),
            T::Float => Value::Float(0.0),
            T::Double => Value::Double(0.0),
            T::Double2 => Value::Double2([0.0; 2]),
            T::Double3 => Value::Double3(DVec3::ZERO),
            T::Double4 => Value::Double4(DVec4::ZERO),
            T::Float2 => Value::Float2([0.0; 2]),
            T::Float3 => Value::Float3(Vec3::ZERO),
            T::Int2 => Value::Int2([0; 2]),
            T::Int3 => Value::Int3(IVec3::ZERO),
            T::Long2 => Value::Long2([0; 2]),
            T::Long3 => Value::Long3([0; 3]),
            T::Short2 => Value::Short2([0; 2]),
            T::Short3 => Value::Short3([0; 3]),
            T::Enum => Value::Enum(0),
            T::Compound | T::Message => Value::Message,
            T::String => Value::String(String::new()),
            T::Distance => Value::Distance(Distance(0.0)),
            T::Angle => Value::Angle(Angle::from_radians(0.0)),
            T::Time => Value::Time(Time(0.0)),
            T::Matrix => Value::Matrix(DMat4::IDENTITY),
            T::FloatArray => Value::FloatArray(Vec::new()),
            T::DoubleArray => Value::DoubleArray(Vec::new()),
            T::IntArray => Value::IntArray(Vec::new()),
            T::PointArray => Value::PointArray(Vec::new()),
            T::VectorArray => Value::VectorArray(Vec::new()),
            T::StringArray => Value::StringArray(Vec::new()),
            T::MatrixArray => Value::MatrixArray(Vec::new()),
        }
    }
}

fn mat_to_plain(m: &DMat4) -> serde_json::Value {
    json!(m.to_cols_array().to_vec())
}

fn mat_from_plain(v: &serde_json::Value) -> Result<DMat4> {
    let elems = v
        .as_array()
        .ok_or_else(|| Error::invalid(format!("expected matrix list, got {v}")))?;
    if elems.len() != 16 {
        return Err(Error::invalid(format!(
            "matrix needs 16 elements, got {}",
            elems.len()
        )));
    }
    let mut cols = [0.0f64; 16];
    for (i, e) in elems.iter().enumerate() {
        cols[i] = e
            .as_f64()
            .ok_or_else(|| Error::invalid(format!("non-numeric matrix element: {e}")))?;
    }
    Ok(DMat4::from_cols_array(&cols))
}

fn f64s_from_plain(v: &serde_json::Value, want: usize) -> Result<Vec<f64>> {
    let elems = v
        .as_array()
        .ok_or_else(|| Error::invalid(format!("expected a list, got {v}")))?;
    if want != 0 && elems.len() != want {
        return Err(Error::invalid(format!(
            "expected {want} elements, got {}",
            elems.len()
        )));
    }
    elems
        .iter()
        .map(|e| {
            e.as_f64()
                .ok_or_else(|| Error::invalid(format!("non-numeric element: {e}")))
        })
        .collect()
}

fn i64s_from_plain(v: &serde_json::Value, want: usize) -> Result<Vec<i64>> {
    let elems = v
        .as_array()
        .ok_or_else(|| Error::invalid(format!("expected a list, got {v}")))?;
    if want != 0 && elems.len() != want {
        return Err(Error::invalid(format!(
            "expected {want} elements, got {}",
            elems.len()
        )));
    }
    elems
        .iter()
        .map(|e| {
            e.as_i64()
                .ok_or_else(|| Error::invalid(format!("non-integer element: {e}")))
        })
        .collect()
}

impl Value {
    /// Short kind name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Message => "message",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Addr(_) => "addr",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Double2(_) => "double2",
            Value::Double3(_) => "double3",
            Value::Double4(_) => "double4",
            Value::Float2(_) => "float2",
            Value::Float3(_) => "float3",
            Value::Int2(_) => "int2",
            Value::Int3(_) => "int3",
            Value::Long2(_) => "long2",
            Value::Long3(_) => "long3",
            Value::Short2(_) => "short2",
            Value::Short3(_) => "short3",
            Value::Enum(_) => "enum",
            Value::String(_) => "string",
            Value::Distance(_) => "distance",
            Value::Angle(_) => "angle",
            Value::Time(_) => "time",
            Value::Matrix(_) => "matrix",
            Value::FloatArray(_) => "floatArray",
            Value::DoubleArray(_) => "doubleArray",
            Value::IntArray(_) => "intArray",
            Value::PointArray(_) => "pointArray",
            Value::VectorArray(_) => "vectorArray",
            Value::StringArray(_) => "stringArray",
            Value::MatrixArray(_) => "matrixArray",
        }
    }

    /// Convert to the plain-JSON shape used by records.
    ///
    /// Unit wrappers flatten to their raw number (angles in radians), vectors
    /// and tuples to lists, matrices to flat 16-element lists; `Message`
    /// becomes `null`.
    pub fn to_plain(&self) -> serde_json::Value {
        match self {
            Value::Message => serde_json::Value::Null,
            Value::Bool(v) => json!(v),
            Value::Byte(v) => json!(v),
            Value::Char(v) => json!(v),
            Value::Short(v) => json!(v),
            Value::Int(v) => json!(v),
            Value::Long(v) => json!(v),
            Value::Addr(v) => json!(v),
            Value::Float(v) => json!(*v as f64),
            Value::Double(v) => json!(v),
            Value::Double2(v) => json!(v.to_vec()),
            Value::Double3(v) => json!([v.x, v.y, v.z]),
            Value::Double4(v) => json!([v.x, v.y, v.z, v.w]),
            Value::Float2(v) => json!([v[0] as f64, v[1] as f64]),
            Value::Float3(v) => json!([v.x as f64, v.y as f64, v.z as f64]),
            Value::Int2(v) => json!(v.to_vec()),
            Value::Int3(v) => json!([v.x, v.y, v.z]),
            Value::Long2(v) => json!(v.to_vec()),
            Value::Long3(v) => json!(v.to_vec()),
            Value::Short2(v) => json!(v.to_vec()),
            Value::Short3(v) => json!(v.to_vec()),
            Value::Enum(v) => json!(v),
            Value::String(v) => json!(v),
            Value::Distance(v) => json!(v.0),
            Value::Angle(v) => json!(v.radians()),
            Value::Time(v) => json!(v.0),
            Value::Matrix(m) => mat_to_plain(m),
            Value::FloatArray(v) => json!(v.iter().map(|x| *x as f64).collect::<Vec<_>>()),
            Value::DoubleArray(v) => json!(v),
            Value::IntArray(v) => json!(v),
            Value::PointArray(v) => {
                json!(v.iter().map(|p| [p.x, p.y, p.z, p.w]).collect::<Vec<_>>())
            }
            Value::VectorArray(v) => {
                json!(v.iter().map(|p| [p.x, p.y, p.z]).collect::<Vec<_>>())
            }
            Value::StringArray(v) => json!(v),
            Value::MatrixArray(v) => json!(v.iter().map(mat_to_plain).collect::<Vec<_>>()),
        }
    }

    /// Box a plain-JSON value into the native representation for `ty`.
    pub fn from_plain(ty: AttrType, plain: &serde_json::Value) -> Result<Value> {
        use AttrType as T;
        let bad = || Error::invalid(format!("cannot read {plain} as {ty}"));
        Ok(match ty {
            T::Bool => Value::Bool(plain.as_bool().ok_or_else(bad)?),
            T::Byte => Value::Byte(plain.as_u64().ok_or_else(bad)? as u8),
            T::Char => Value::Char(plain.as_i64().ok_or_else(bad)? as i8),
            T::Short => Value::Short(plain.as_i64().ok_or_else(bad)? as i16),
            T::Int => Value::Int(plain.as_i64().ok_or_else(bad)? as i32),
            T::Long => Value::Long(plain.as_i64().ok_or_else(bad)?),
            T::Addr => Value::Addr(plain.as_u64().ok_or_else(bad)?),
            T::Float => Value::Float(plain.as_f64().ok_or_else(bad)? as f32),
            T::Double => Value::Double(plain.as_f64().ok_or_else(bad)?),
            T::Double2 => {
                let v = f64s_from_plain(plain, 2)?;
                Value::Double2([v[0], v[1]])
            }
            T::Double3 => {
                let v = f64s_from_plain(plain, 3)?;
                Value::Double3(DVec3::new(v[0], v[1], v[2]))
            }
            T::Double4 => {
                let v = f64s_from_plain(plain, 4)?;
                Value::Double4(DVec4::new(v[0], v[1], v[2], v[3]))
            }
            T::Float2 => {
                let v = f64s_from_plain(plain, 2)?;
                Value::Float2([v[0] as f32, v[1] as f32])
            }
            T::Float3 => {
                let v = f64s_from_plain(plain, 3)?;
                Value::Float3(Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32))
            }
            T::Int2 => {
                let v = i64s_from_plain(plain, 2)?;
                Value::Int2([v[0] as i32, v[1] as i32])
            }
            T::Int3 => {
                let v = i64s_from_plain(plain, 3)?;
                Value::Int3(IVec3::new(v[0] as i32, v[1] as i32, v[2] as i32))
            }
            T::Long2 => {
                let v = i64s_from_plain(plain, 2)?;
                Value::Long2([v[0], v[1]])
            }
            T::Long3 => {
                let v = i64s_from_plain(plain, 3)?;
                Value::Long3([v[0], v[1], v[2]])
            }
            T::Short2 => {
                let v = i64s_from_plain(plain, 2)?;
                Value::Short2([v[0] as i16, v[1] as i16])
            }
            T::Short3 => {
                let v = i64s_from_plain(plain, 3)?;
                Value::Short3([v[0] as i16, v[1] as i16, v[2] as i16])
            }
            T::Enum => Value::Enum(plain.as_i64().ok_or_else(bad)? as i32),
            T::Compound | T::Message => Value::Message,
            T::String => Value::String(plain.as_str().ok_or_else(bad)?.to_string()),
            T::Distance => Value::Distance(Distance(plain.as_f64().ok_or_else(bad)?)),
            T::Angle => Value::Angle(Angle::from_radians(plain.as_f64().ok_or_else(bad)?)),
            T::Time => Value::Time(Time(plain.as_f64().ok_or_else(bad)?)),
            T::Matrix => Value::Matrix(mat_from_plain(plain)?),
            T::FloatArray => Value::FloatArray(
                f64s_from_plain(plain, 0)?.into_iter().map(|x| x as f32).collect(),
            ),
            T::DoubleArray => Value::DoubleArray(f64s_from_plain(plain, 0)?),
            T::IntArray => Value::IntArray(
                i64s_from_plain(plain, 0)?.into_iter().map(|x| x as i32).collect(),
            ),
            T::PointArray => {
                let rows = plain.as_array().ok_or_else(bad)?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let v = f64s_from_plain(row, 4)?;
                    out.push(DVec4::new(v[0], v[1], v[2], v[3]));
                }
                Value::PointArray(out)
            }
            T::VectorArray => {
                let rows = plain.as_array().ok_or_else(bad)?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let v = f64s_from_plain(row, 3)?;
                    out.push(DVec3::new(v[0], v[1], v[2]));
                }
                Value::VectorArray(out)
            }
            T::StringArray => {
                let rows = plain.as_array().ok_or_else(bad)?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    out.push(row.as_str().ok_or_else(bad)?.to_string());
                }
                Value::StringArray(out)
            }
            T::MatrixArray => {
                let rows = plain.as_array().ok_or_else(bad)?;
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    out.push(mat_from_plain(row)?);
                }
                Value::MatrixArray(out)
            }
        })
    }

    /// Split a tuple value into its component scalars, `None` for
    /// non-tuple values.
    pub fn components(&self) -> Option<Vec<Value>> {
        Some(match self {
            Value::Double2(v) => v.iter().copied().map(Value::Double).collect(),
            Value::Double3(v) => vec![Value::Double(v.x), Value::Double(v.y), Value::Double(v.z)],
            Value::Double4(v) => vec![
                Value::Double(v.x),
                Value::Double(v.y),
                Value::Double(v.z),
                Value::Double(v.w),
            ],
            Value::Float2(v) => v.iter().copied().map(Value::Float).collect(),
            Value::Float3(v) => vec![Value::Float(v.x), Value::Float(v.y), Value::Float(v.z)],
            Value::Int2(v) => v.iter().copied().map(Value::Int).collect(),
            Value::Int3(v) => vec![Value::Int(v.x), Value::Int(v.y), Value::Int(v.z)],
            Value::Long2(v) => v.iter().copied().map(Value::Long).collect(),
            Value::Long3(v) => v.iter().copied().map(Value::Long).collect(),
            Value::Short2(v) => v.iter().copied().map(Value::Short).collect(),
            Value::Short3(v) => v.iter().copied().map(Value::Short).collect(),
            _ => return None,
        })
    }

    /// Rebuild a tuple value of type `ty` from its component scalars.
    pub fn from_components(ty: AttrType, parts: &[Value]) -> Result<Value> {
        let plain = serde_json::Value::Array(parts.iter().map(Value::to_plain).collect());
        Value::from_plain(ty, &plain)
    }

    /// Coerce a value into the representation required by `ty`.
    ///
    /// An exact variant match passes through; scalar numerics cross-convert;
    /// plain numbers wrap into unit types; anything else is a type mismatch.
    pub fn coerce(ty: AttrType, value: Value) -> Result<Value> {
        if value.kind() == ty.name() {
            return Ok(value);
        }
        let as_f64 = |v: &Value| -> Option<f64> {
            match v {
                Value::Bool(b) => Some(*b as i64 as f64),
                Value::Byte(x) => Some(*x as f64),
                Value::Char(x) => Some(*x as f64),
                Value::Short(x) => Some(*x as f64),
                Value::Int(x) => Some(*x as f64),
                Value::Long(x) => Some(*x as f64),
                Value::Addr(x) => Some(*x as f64),
                Value::Float(x) => Some(*x as f64),
                Value::Double(x) => Some(*x),
                Value::Distance(d) => Some(d.0),
                Value::Angle(a) => Some(a.radians()),
                Value::Time(t) => Some(t.0),
                Value::Enum(x) => Some(*x as f64),
                _ => None,
            }
        };
        use AttrType as T;
        if let Some(x) = as_f64(&value) {
            let coerced = match ty {
                T::Bool => Some(Value::Bool(x != 0.0)),
                T::Byte => Some(Value::Byte(x as u8)),
                T::Char => Some(Value::Char(x as i8)),
                T::Short => Some(Value::Short(x as i16)),
                T::Int => Some(Value::Int(x as i32)),
                T::Long => Some(Value::Long(x as i64)),
                T::Addr => Some(Value::Addr(x as u64)),
                T::Float => Some(Value::Float(x as f32)),
                T::Double => Some(Value::Double(x)),
                T::Enum => Some(Value::Enum(x as i32)),
                T::Distance => Some(Value::Distance(Distance(x))),
                T::Angle => Some(Value::Angle(Angle::from_radians(x))),
                T::Time => Some(Value::Time(Time(x))),
                _ => None,
            };
            if let Some(v) = coerced {
                return Ok(v);
            }
        }
        // Tuple cross-conversion goes through the plain shape.
        if ty.components().is_some() {
            if let Ok(v) = Value::from_plain(ty, &value.to_plain()) {
                return Ok(v);
            }
        }
        Err(Error::mismatch(ty.name(), value.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_roundtrip_scalars() {
        for (ty, v) in [
            (AttrType::Bool, Value::Bool(true)),
            (AttrType::Int, Value::Int(-7)),
            (AttrType::Double, Value::Double(1.5)),
            (AttrType::String, Value::String("hips_ctrl".into())),
            (AttrType::Enum, Value::Enum(2)),
        ] {
            let plain = v.to_plain();
            assert_eq!(Value::from_plain(ty, &plain).unwrap(), v);
        }
    }

    #[test]
    fn test_angle_serializes_as_radians() {
        let v = Value::Angle(Angle::from_degrees(90.0));
        let plain = v.to_plain();
        assert!((plain.as_f64().unwrap() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_plain_shape() {
        let v = Value::Matrix(DMat4::IDENTITY);
        let plain = v.to_plain();
        assert_eq!(plain.as_array().unwrap().len(), 16);
        assert_eq!(Value::from_plain(AttrType::Matrix, &plain).unwrap(), v);
    }

    #[test]
    fn test_vector_array_roundtrip() {
        let v = Value::VectorArray(vec![DVec3::new(1.0, 2.0, 3.0), DVec3::ZERO]);
        let plain = v.to_plain();
        assert_eq!(Value::from_plain(AttrType::VectorArray, &plain).unwrap(), v);
    }

    #[test]
    fn test_coerce_numeric_widening() {
        assert_eq!(
            Value::coerce(AttrType::Double, Value::Int(3)).unwrap(),
            Value::Double(3.0)
        );
        assert_eq!(
            Value::coerce(AttrType::Angle, Value::Double(0.5)).unwrap(),
            Value::Angle(Angle::from_radians(0.5))
        );
        assert!(Value::coerce(AttrType::Double3, Value::String("x".into())).is_err());
    }

    #[test]
    fn test_tuple_components_roundtrip() {
        let v = Value::Double3(DVec3::new(1.0, 2.0, 3.0));
        let parts = v.components().unwrap();
        assert_eq!(parts[1], Value::Double(2.0));
        assert_eq!(Value::from_components(AttrType::Double3, &parts).unwrap(), v);

        let v = Value::Int2([4, 5]);
        let parts = v.components().unwrap();
        assert_eq!(Value::from_components(AttrType::Int2, &parts).unwrap(), v);

        assert!(Value::Double(1.0).components().is_none());
        assert!(Value::Matrix(DMat4::IDENTITY).components().is_none());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(AttrType::Double3.default_value(), Value::Double3(DVec3::ZERO));
        assert_eq!(AttrType::Matrix.default_value(), Value::Matrix(DMat4::IDENTITY));
        assert_eq!(AttrType::Message.default_value(), Value::Message);
    }
}
