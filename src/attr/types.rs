//! Attribute type tags.
//!
//! `AttrType` is the closed set of value types an attribute can carry. Every
//! plug operation dispatches on it: reads, writes, record serialization and
//! attribute creation. The set is deliberately exhaustive so a `match` on it
//! cannot silently miss a tag.

use serde::{Deserialize, Serialize};

/// Attribute value type tag.
///
/// Serialized as a camelCase string in records (`"double3"`, `"matrixArray"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttrType {
    // Numeric scalars
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Addr,
    Float,
    Double,
    // Numeric tuples
    Double2,
    Double3,
    Double4,
    Float2,
    Float3,
    Int2,
    Int3,
    Long2,
    Long3,
    Short2,
    Short3,
    // Enum (index into a field list)
    Enum,
    // Structural
    Compound,
    Message,
    // Typed data
    String,
    Matrix,
    // Unit-bearing scalars
    Distance,
    Angle,
    Time,
    // Typed arrays
    FloatArray,
    DoubleArray,
    IntArray,
    PointArray,
    VectorArray,
    StringArray,
    MatrixArray,
}

/// Broad category of an attribute type, used for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrCategory {
    /// Plain numeric scalars and tuples.
    Numeric,
    /// Unit-bearing scalars (distance, angle, time).
    Unit,
    /// Enum index with named fields.
    Enum,
    /// Typed data (strings, arrays).
    Typed,
    /// 4x4 matrix.
    Matrix,
    /// Message (identity-only, no value).
    Message,
    /// Compound parent.
    Compound,
}

impl AttrType {
    /// The category this tag dispatches to.
    pub fn category(&self) -> AttrCategory {
        use AttrType::*;
        match self {
            Bool | Byte | Char | Short | Int | Long | Addr | Float | Double | Double2
            | Double3 | Double4 | Float2 | Float3 | Int2 | Int3 | Long2 | Long3 | Short2
            | Short3 => AttrCategory::Numeric,
            Distance | Angle | Time => AttrCategory::Unit,
            Enum => AttrCategory::Enum,
            String | FloatArray | DoubleArray | IntArray | PointArray | VectorArray
            | StringArray | MatrixArray => AttrCategory::Typed,
            Matrix => AttrCategory::Matrix,
            Message => AttrCategory::Message,
            Compound => AttrCategory::Compound,
        }
    }

    /// Record-facing name of the tag.
    pub fn name(&self) -> &'static str {
        use AttrType::*;
        match self {
            Bool => "bool",
            Byte => "byte",
            Char => "char",
            Short => "short",
            Int => "int",
            Long => "long",
            Addr => "addr",
            Float => "float",
            Double => "double",
            Double2 => "double2",
            Double3 => "double3",
            Double4 => "double4",
            Float2 => "float2",
            Float3 => "float3",
            Int2 => "int2",
            Int3 => "int3",
            Long2 => "long2",
            Long3 => "long3",
            Short2 => "short2",
            Short3 => "short3",
            Enum => "enum",
            Compound => "compound",
            Message => "message",
            String => "string",
            Distance => "distance",
            Angle => "angle",
            Time => "time",
            Matrix => "matrix",
            FloatArray => "floatArray",
            DoubleArray => "doubleArray",
            IntArray => "intArray",
            PointArray => "pointArray",
            VectorArray => "vectorArray",
            StringArray => "stringArray",
            MatrixArray => "matrixArray",
        }
    }

    /// Whether min/max/soft bounds apply to this type.
    ///
    /// Bounds apply to single-component numeric, unit and enum attributes.
    pub fn has_bounds(&self) -> bool {
        use AttrType::*;
        matches!(
            self,
            Byte | Char
                | Short
                | Int
                | Long
                | Addr
                | Float
                | Double
                | Distance
                | Angle
                | Time
                | Enum
        )
    }

    /// Component count for tuple types, `None` for everything else.
    pub fn components(&self) -> Option<usize> {
        use AttrType::*;
        match self {
            Double2 | Float2 | Int2 | Long2 | Short2 => Some(2),
            Double3 | Float3 | Int3 | Long3 | Short3 => Some(3),
            Double4 => Some(4),
            _ => None,
        }
    }

    /// Scalar type of one tuple component, `None` for non-tuple types.
    pub fn component_type(&self) -> Option<AttrType> {
        use AttrType::*;
        match self {
            Double2 | Double3 | Double4 => Some(Double),
            Float2 | Float3 => Some(Float),
            Int2 | Int3 => Some(Int),
            Long2 | Long3 => Some(Long),
            Short2 | Short3 => Some(Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names_match_serde() {
        for ty in [
            AttrType::Bool,
            AttrType::Double3,
            AttrType::MatrixArray,
            AttrType::Enum,
        ] {
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json.as_str().unwrap(), ty.name());
        }
    }

    #[test]
    fn test_bounds_apply_to_scalars_only() {
        assert!(AttrType::Double.has_bounds());
        assert!(AttrType::Angle.has_bounds());
        assert!(AttrType::Enum.has_bounds());
        assert!(!AttrType::Bool.has_bounds());
        assert!(!AttrType::Double3.has_bounds());
        assert!(!AttrType::String.has_bounds());
        assert!(!AttrType::Message.has_bounds());
    }

    #[test]
    fn test_components() {
        assert_eq!(AttrType::Double3.components(), Some(3));
        assert_eq!(AttrType::Double4.components(), Some(4));
        assert_eq!(AttrType::Double.components(), None);
        assert_eq!(AttrType::Double3.component_type(), Some(AttrType::Double));
        assert_eq!(AttrType::Short2.component_type(), Some(AttrType::Short));
        assert_eq!(AttrType::Matrix.component_type(), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(AttrType::Float3.category(), AttrCategory::Numeric);
        assert_eq!(AttrType::Time.category(), AttrCategory::Unit);
        assert_eq!(AttrType::StringArray.category(), AttrCategory::Typed);
        assert_eq!(AttrType::Compound.category(), AttrCategory::Compound);
    }
}
