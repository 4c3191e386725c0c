//! C-compatible layout for structured types.
//!
//! Uses the repc crate to compute field offsets and sizes for the host
//! target, so pointer-passed records can be read field by field from
//! generated code and from Rust test fixtures alike.

use repc::layout::{BuiltinType, Record, RecordField, RecordKind, Type, TypeVariant};

use crate::{RecordDef, ScalarType, TypeError};

/// Computed layout of one record: total size, alignment, and the byte
/// offset of every field in definition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub size_bytes: usize,
    pub align_bytes: usize,
    pub field_offsets: Vec<usize>,
}

impl RecordLayout {
    /// Byte offset of a field by name, if the record has it.
    pub fn offset_of(&self, def: &RecordDef, field: &str) -> Option<usize> {
        def.field_index(field).map(|i| self.field_offsets[i])
    }
}

fn scalar_builtin(scalar: ScalarType) -> BuiltinType {
    match scalar {
        ScalarType::I8 => BuiltinType::Char,
        ScalarType::U8 | ScalarType::Bool => BuiltinType::UnsignedChar,
        ScalarType::I16 => BuiltinType::Short,
        ScalarType::U16 => BuiltinType::UnsignedShort,
        ScalarType::I32 => BuiltinType::Int,
        ScalarType::U32 => BuiltinType::UnsignedInt,
        ScalarType::I64 => BuiltinType::LongLong,
        ScalarType::U64 => BuiltinType::UnsignedLongLong,
        ScalarType::F32 => BuiltinType::Float,
        ScalarType::F64 => BuiltinType::Double,
    }
}

/// Computes the host-target layout of a record definition.
pub fn record_layout(def: &RecordDef) -> Result<RecordLayout, TypeError> {
    let target = repc::HOST_TARGET
        .expect("host target should be available for layout computation");

    let fields = def
        .fields
        .iter()
        .map(|(_, scalar)| RecordField {
            layout: None,
            annotations: vec![],
            named: true,
            bit_width: None,
            ty: Type {
                layout: (),
                annotations: vec![],
                variant: TypeVariant::Builtin(scalar_builtin(*scalar)),
            },
        })
        .collect();

    let record_type = Type {
        layout: (),
        annotations: vec![],
        variant: TypeVariant::Record(Record {
            kind: RecordKind::Struct,
            fields,
        }),
    };

    let computed = repc::compute_layout(target, &record_type)?;

    let record = match computed.variant {
        TypeVariant::Record(record) => record,
        _ => unreachable!("computed layout of a record is a record"),
    };

    let mut field_offsets = Vec::with_capacity(record.fields.len());
    for (i, field) in record.fields.iter().enumerate() {
        let layout = field
            .layout
            .ok_or(TypeError::MissingFieldLayout(i))?;
        field_offsets.push((layout.offset_bits / 8) as usize);
    }

    Ok(RecordLayout {
        size_bytes: (computed.layout.size_bits / 8) as usize,
        align_bytes: (computed.layout.required_alignment_bits / 8) as usize,
        field_offsets,
    })
}
