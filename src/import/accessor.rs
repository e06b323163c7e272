use crate::error::AccessorError;

use super::document::{Accessor, Document};

// ─── Component / element types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub(crate) fn from_code(code: u32) -> Option<Self> {
        match code {
            5120 => Some(Self::I8),
            5121 => Some(Self::U8),
            5122 => Some(Self::I16),
            5123 => Some(Self::U16),
            5125 => Some(Self::U32),
            5126 => Some(Self::F32),
            _ => None,
        }
    }

    pub(crate) fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    fn is_unsigned_integer(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "SCALAR" => Some(Self::Scalar),
            "VEC2" => Some(Self::Vec2),
            "VEC3" => Some(Self::Vec3),
            "VEC4" => Some(Self::Vec4),
            "MAT2" => Some(Self::Mat2),
            "MAT3" => Some(Self::Mat3),
            "MAT4" => Some(Self::Mat4),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }

    /// (rows, columns); vectors are a single column.
    fn shape(self) -> (usize, usize) {
        match self {
            Self::Scalar => (1, 1),
            Self::Vec2 => (2, 1),
            Self::Vec3 => (3, 1),
            Self::Vec4 => (4, 1),
            Self::Mat2 => (2, 2),
            Self::Mat3 => (3, 3),
            Self::Mat4 => (4, 4),
        }
    }

    pub(crate) fn components(self) -> usize {
        let (rows, columns) = self.shape();
        rows * columns
    }

    fn is_matrix(self) -> bool {
        matches!(self, Self::Mat2 | Self::Mat3 | Self::Mat4)
    }
}

/// Byte layout of one element. Matrix columns start on 4-byte boundaries.
#[derive(Debug, Clone, Copy)]
struct ElementLayout {
    rows: usize,
    columns: usize,
    component_size: usize,
    column_stride: usize,
}

impl ElementLayout {
    fn new(element: ElementType, component: ComponentType) -> Self {
        let (rows, columns) = element.shape();
        let component_size = component.size();
        let column_bytes = rows * component_size;
        let column_stride = if element.is_matrix() {
            column_bytes.next_multiple_of(4)
        } else {
            column_bytes
        };
        Self {
            rows,
            columns,
            component_size,
            column_stride,
        }
    }

    fn size(&self) -> usize {
        self.column_stride * self.columns
    }

    /// Byte offsets of each component within an element, column-major.
    fn component_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.columns).flat_map(move |column| {
            (0..self.rows).map(move |row| column * self.column_stride + row * self.component_size)
        })
    }
}

// ─── Accessor metadata ────────────────────────────────────────────────────────

fn accessor_at(document: &Document, index: usize) -> Result<&Accessor, AccessorError> {
    document
        .root
        .accessors
        .get(index)
        .ok_or(AccessorError::Missing(index))
}

fn accessor_types(
    accessor: &Accessor,
    index: usize,
) -> Result<(ElementType, ComponentType), AccessorError> {
    let element = ElementType::from_name(&accessor.element_type).ok_or_else(|| {
        AccessorError::UnsupportedType {
            accessor: index,
            reason: format!("unknown element type '{}'", accessor.element_type),
        }
    })?;
    let component = ComponentType::from_code(accessor.component_type).ok_or_else(|| {
        AccessorError::UnsupportedType {
            accessor: index,
            reason: format!("unknown component type {}", accessor.component_type),
        }
    })?;
    Ok((element, component))
}

/// Element type of an accessor, for attribute shape checks.
pub(crate) fn element_type(document: &Document, index: usize) -> Result<ElementType, AccessorError> {
    let accessor = accessor_at(document, index)?;
    accessor_types(accessor, index).map(|(element, _)| element)
}

/// Bytes of a buffer view, bounds-checked against its buffer.
fn view_bytes<'a>(
    document: &'a Document,
    accessor: usize,
    view_index: usize,
) -> Result<(&'a [u8], Option<usize>), AccessorError> {
    let view = document
        .root
        .buffer_views
        .get(view_index)
        .ok_or(AccessorError::MissingView {
            accessor,
            view: view_index,
        })?;
    let buffer = document
        .buffer_bytes(view.buffer)
        .ok_or(AccessorError::MissingData {
            accessor,
            buffer: view.buffer,
        })?;
    let end = view.byte_offset.saturating_add(view.byte_length);
    let bytes = buffer
        .get(view.byte_offset..end)
        .ok_or(AccessorError::OutOfRange {
            accessor,
            required: end,
            available: buffer.len(),
        })?;
    Ok((bytes, view.byte_stride))
}

/// A validated strided window: every element in `0..count` lies inside `bytes`.
struct StridedSlice<'a> {
    bytes: &'a [u8],
    start: usize,
    stride: usize,
}

impl StridedSlice<'_> {
    fn element_offset(&self, element: usize) -> usize {
        self.start + element * self.stride
    }
}

fn strided_slice<'a>(
    bytes: &'a [u8],
    accessor: usize,
    start: usize,
    stride: Option<usize>,
    count: usize,
    element_size: usize,
) -> Result<StridedSlice<'a>, AccessorError> {
    let stride = stride.unwrap_or(element_size);
    if stride < element_size {
        return Err(AccessorError::StrideTooSmall {
            accessor,
            stride,
            element_size,
        });
    }
    if count > 0 {
        let required = (count - 1)
            .checked_mul(stride)
            .and_then(|span| span.checked_add(start))
            .and_then(|span| span.checked_add(element_size))
            .unwrap_or(usize::MAX);
        if required > bytes.len() {
            return Err(AccessorError::OutOfRange {
                accessor,
                required,
                available: bytes.len(),
            });
        }
    }
    Ok(StridedSlice {
        bytes,
        start,
        stride,
    })
}

// ─── Component decoding ───────────────────────────────────────────────────────

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    bytes.get(offset..offset + N)?.try_into().ok()
}

fn read_float(bytes: &[u8], offset: usize, component: ComponentType, normalized: bool) -> Option<f32> {
    let value = match component {
        ComponentType::F32 => f32::from_le_bytes(read_array(bytes, offset)?),
        ComponentType::I8 => {
            let value = i8::from_le_bytes(read_array(bytes, offset)?) as f32;
            if normalized {
                (value / 127.0).max(-1.0)
            } else {
                value
            }
        }
        ComponentType::U8 => {
            let value = u8::from_le_bytes(read_array(bytes, offset)?) as f32;
            if normalized { value / 255.0 } else { value }
        }
        ComponentType::I16 => {
            let value = i16::from_le_bytes(read_array(bytes, offset)?) as f32;
            if normalized {
                (value / 32767.0).max(-1.0)
            } else {
                value
            }
        }
        ComponentType::U16 => {
            let value = u16::from_le_bytes(read_array(bytes, offset)?) as f32;
            if normalized { value / 65535.0 } else { value }
        }
        ComponentType::U32 => {
            let value = u32::from_le_bytes(read_array(bytes, offset)?) as f64;
            if normalized {
                (value / u32::MAX as f64) as f32
            } else {
                value as f32
            }
        }
    };
    Some(value)
}

fn read_uint(bytes: &[u8], offset: usize, component: ComponentType) -> Option<u32> {
    match component {
        ComponentType::U8 => read_array::<1>(bytes, offset).map(|value| value[0] as u32),
        ComponentType::U16 => read_array(bytes, offset).map(|value| u16::from_le_bytes(value) as u32),
        ComponentType::U32 => read_array(bytes, offset).map(u32::from_le_bytes),
        _ => None,
    }
}

// ─── Unpacking ────────────────────────────────────────────────────────────────

fn unpack_with<T: Copy + Default>(
    document: &Document,
    index: usize,
    read: impl Fn(&[u8], usize, ComponentType, bool) -> Option<T>,
) -> Result<Vec<T>, AccessorError> {
    let accessor = accessor_at(document, index)?;
    let (element, component) = accessor_types(accessor, index)?;
    let layout = ElementLayout::new(element, component);
    let components = element.components();

    let out_of_range = |required: usize, available: usize| AccessorError::OutOfRange {
        accessor: index,
        required,
        available,
    };

    // Bounds are checked before allocating so `count` is limited by real data.
    let slice = match accessor.buffer_view {
        Some(view_index) => {
            let (bytes, stride) = view_bytes(document, index, view_index)?;
            Some(strided_slice(
                bytes,
                index,
                accessor.byte_offset,
                stride,
                accessor.count,
                layout.size(),
            )?)
        }
        None => None,
    };

    let total = accessor
        .count
        .checked_mul(components)
        .ok_or_else(|| out_of_range(usize::MAX, 0))?;
    let mut values = Vec::new();
    values
        .try_reserve_exact(total)
        .map_err(|_| out_of_range(total, 0))?;
    values.resize(total, T::default());

    if let Some(slice) = slice {
        for element_index in 0..accessor.count {
            let base = slice.element_offset(element_index);
            for (lane, offset) in layout.component_offsets().enumerate() {
                values[element_index * components + lane] =
                    read(slice.bytes, base + offset, component, accessor.normalized)
                        .ok_or_else(|| out_of_range(base + offset, slice.bytes.len()))?;
            }
        }
    }

    if let Some(sparse) = &accessor.sparse {
        let index_component = ComponentType::from_code(sparse.indices.component_type)
            .filter(|component| component.is_unsigned_integer())
            .ok_or_else(|| AccessorError::UnsupportedType {
                accessor: index,
                reason: format!(
                    "sparse index component type {}",
                    sparse.indices.component_type
                ),
            })?;

        let (index_bytes, _) = view_bytes(document, index, sparse.indices.buffer_view)?;
        let indices = strided_slice(
            index_bytes,
            index,
            sparse.indices.byte_offset,
            None,
            sparse.count,
            index_component.size(),
        )?;
        let (value_bytes, _) = view_bytes(document, index, sparse.values.buffer_view)?;
        let substitutes = strided_slice(
            value_bytes,
            index,
            sparse.values.byte_offset,
            None,
            sparse.count,
            layout.size(),
        )?;

        for entry in 0..sparse.count {
            let index_offset = indices.element_offset(entry);
            let target = read_uint(indices.bytes, index_offset, index_component)
                .ok_or_else(|| out_of_range(index_offset, indices.bytes.len()))?;
            if target as usize >= accessor.count {
                return Err(AccessorError::SparseIndex {
                    accessor: index,
                    index: target,
                    count: accessor.count,
                });
            }
            let base = substitutes.element_offset(entry);
            for (lane, offset) in layout.component_offsets().enumerate() {
                values[target as usize * components + lane] =
                    read(substitutes.bytes, base + offset, component, accessor.normalized)
                        .ok_or_else(|| out_of_range(base + offset, substitutes.bytes.len()))?;
            }
        }
    }

    Ok(values)
}

/// Accessor data as `count * components` floats.
pub(crate) fn unpack_floats(document: &Document, index: usize) -> Result<Vec<f32>, AccessorError> {
    unpack_with(document, index, read_float)
}

/// Accessor data as `count * components` unsigned integers. Only u8, u16
/// and u32 components are accepted.
pub(crate) fn unpack_uints(document: &Document, index: usize) -> Result<Vec<u32>, AccessorError> {
    let accessor = accessor_at(document, index)?;
    let (_, component) = accessor_types(accessor, index)?;
    if !component.is_unsigned_integer() {
        return Err(AccessorError::UnsupportedType {
            accessor: index,
            reason: format!("{component:?} data cannot be read as unsigned integers"),
        });
    }
    unpack_with(document, index, |bytes, offset, component, _| {
        read_uint(bytes, offset, component)
    })
}
