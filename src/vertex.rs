use serde::{Deserialize, Serialize};

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeType {
    Position,
    Normal,
    Tangent,
    Color,
    BoneIndex,
    BoneWeight,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    TexCoord3,
}

impl AttributeType {
    /// Parses the lowercase name used by converted-shader manifests.
    pub fn from_name(name: &str) -> Option<Self> {
        use AttributeType::*;
        let attribute = match name {
            "position" => Position,
            "normal" => Normal,
            "tangent" => Tangent,
            "color" => Color,
            "boneindex" => BoneIndex,
            "boneweight" => BoneWeight,
            "texcoord0" => TexCoord0,
            "texcoord1" => TexCoord1,
            "texcoord2" => TexCoord2,
            "texcoord3" => TexCoord3,
            _ => return None,
        };
        Some(attribute)
    }
}

/// Storage type of one vertex attribute inside the vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexAttributeType {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Float16x2,
    Float16x4,
    Unorm8x4,
    Uint8x4,
    Snorm16x2,
    Snorm16x4,
}

impl VertexAttributeType {
    pub fn size(self) -> u32 {
        match self {
            VertexAttributeType::Float32
            | VertexAttributeType::Float16x2
            | VertexAttributeType::Unorm8x4
            | VertexAttributeType::Uint8x4
            | VertexAttributeType::Snorm16x2 => 4,
            VertexAttributeType::Float32x2
            | VertexAttributeType::Float16x4
            | VertexAttributeType::Snorm16x4 => 8,
            VertexAttributeType::Float32x3 => 12,
            VertexAttributeType::Float32x4 => 16,
        }
    }
}

/// One attribute of an interleaved vertex layout, in buffer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexAttribute {
    pub component: AttributeType,
    pub data_type: VertexAttributeType,
}

impl VertexAttribute {
    pub const fn new(component: AttributeType, data_type: VertexAttributeType) -> Self {
        Self {
            component,
            data_type,
        }
    }
}

/// Byte stride of an interleaved layout.
pub fn vertex_stride(attributes: &[VertexAttribute]) -> u32 {
    attributes.iter().map(|a| a.data_type.size()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_sum_of_attribute_sizes() {
        let layout = [
            VertexAttribute::new(AttributeType::Position, VertexAttributeType::Float32x3),
            VertexAttribute::new(AttributeType::Normal, VertexAttributeType::Snorm16x4),
            VertexAttribute::new(AttributeType::TexCoord0, VertexAttributeType::Float16x2),
        ];
        assert_eq!(vertex_stride(&layout), 24);
    }

    #[test]
    fn attribute_names_parse() {
        assert_eq!(AttributeType::from_name("texcoord2"), Some(AttributeType::TexCoord2));
        assert_eq!(AttributeType::from_name("POSITION"), None);
    }
}
