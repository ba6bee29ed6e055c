//! Typed host-side storage for one kernel argument of one job.

use crate::ElementType;

/// A host array whose element type matches a kernel argument.
///
/// Backed by a typed `Vec` so the byte views handed to the device are always aligned.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
}

impl Column {
    pub fn zeroed(ty: ElementType, len: usize) -> Self {
        match ty {
            ElementType::F32 => Column::F32(vec![0.0; len]),
            ElementType::F64 => Column::F64(vec![0.0; len]),
            ElementType::I32 => Column::I32(vec![0; len]),
            ElementType::U32 => Column::U32(vec![0; len]),
            ElementType::I64 => Column::I64(vec![0; len]),
            ElementType::U64 => Column::U64(vec![0; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Column::F32(_) => ElementType::F32,
            Column::F64(_) => ElementType::F64,
            Column::I32(_) => ElementType::I32,
            Column::U32(_) => ElementType::U32,
            Column::I64(_) => ElementType::I64,
            Column::U64(_) => ElementType::U64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::F32(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::I32(v) => v.len(),
            Column::U32(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Column::F32(v) => bytemuck::cast_slice(v),
            Column::F64(v) => bytemuck::cast_slice(v),
            Column::I32(v) => bytemuck::cast_slice(v),
            Column::U32(v) => bytemuck::cast_slice(v),
            Column::I64(v) => bytemuck::cast_slice(v),
            Column::U64(v) => bytemuck::cast_slice(v),
        }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Column::F32(v) => bytemuck::cast_slice_mut(v),
            Column::F64(v) => bytemuck::cast_slice_mut(v),
            Column::I32(v) => bytemuck::cast_slice_mut(v),
            Column::U32(v) => bytemuck::cast_slice_mut(v),
            Column::I64(v) => bytemuck::cast_slice_mut(v),
            Column::U64(v) => bytemuck::cast_slice_mut(v),
        }
    }

    /// Element `i` widened to `f64`; exact for every type but the largest 64-bit integers.
    pub fn float(&self, i: usize) -> f64 {
        match self {
            Column::F32(v) => f64::from(v[i]),
            Column::F64(v) => v[i],
            Column::I32(v) => f64::from(v[i]),
            Column::U32(v) => f64::from(v[i]),
            Column::I64(v) => v[i] as f64,
            Column::U64(v) => v[i] as f64,
        }
    }

    /// Element `i` as a signed integer; float elements are truncated.
    pub fn int(&self, i: usize) -> i64 {
        match self {
            Column::F32(v) => v[i] as i64,
            Column::F64(v) => v[i] as i64,
            Column::I32(v) => i64::from(v[i]),
            Column::U32(v) => i64::from(v[i]),
            Column::I64(v) => v[i],
            Column::U64(v) => v[i] as i64,
        }
    }

    /// Raw bits of element `i`, zero-extended.
    pub fn bits(&self, i: usize) -> u64 {
        match self {
            Column::F32(v) => u64::from(v[i].to_bits()),
            Column::F64(v) => v[i].to_bits(),
            Column::I32(v) => u64::from(v[i] as u32),
            Column::U32(v) => u64::from(v[i]),
            Column::I64(v) => v[i] as u64,
            Column::U64(v) => v[i],
        }
    }

    /// Stores raw `bits` into element `i`, truncating to the element size.
    pub fn set_bits(&mut self, i: usize, bits: u64) {
        match self {
            Column::F32(v) => v[i] = f32::from_bits(bits as u32),
            Column::F64(v) => v[i] = f64::from_bits(bits),
            Column::I32(v) => v[i] = bits as u32 as i32,
            Column::U32(v) => v[i] = bits as u32,
            Column::I64(v) => v[i] = bits as i64,
            Column::U64(v) => v[i] = bits,
        }
    }

    /// Stores `value` into element `i`, rounding to the element type.
    pub fn set_float(&mut self, i: usize, value: f64) {
        match self {
            Column::F32(v) => v[i] = value as f32,
            Column::F64(v) => v[i] = value,
            Column::I32(v) => v[i] = value as i32,
            Column::U32(v) => v[i] = value as u32,
            Column::I64(v) => v[i] = value as i64,
            Column::U64(v) => v[i] = value as u64,
        }
    }

    /// Human-readable element `i`: `%a` for floats, decimal for signed, hex for unsigned.
    pub fn describe(&self, i: usize) -> String {
        match self {
            Column::F32(v) => crate::hexfloat::hex_f32(v[i]),
            Column::F64(v) => crate::hexfloat::hex_f64(v[i]),
            Column::I32(v) => v[i].to_string(),
            Column::I64(v) => v[i].to_string(),
            Column::U32(v) => format!("{:#x}", v[i]),
            Column::U64(v) => format!("{:#x}", v[i]),
        }
    }
}
