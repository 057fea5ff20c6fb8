use serde::{Serialize, Deserialize};

use crate::error::{RecoError, Result};

/// One named bit field inside a packed 64-bit cell ID
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BitField {
    pub name: String,
    pub offset: u32,
    pub width: u32,
    pub signed: bool,
}

impl BitField {
    fn mask(&self) -> u64 {
        if self.width >= 64 { u64::MAX } else { (1u64 << self.width) - 1 }
    }
}

/// Decoder for geometry-encoded cell identifiers.
///
/// Fields are packed least-significant-first; a field declared with a
/// negative width in the descriptor string is sign-extended on decode.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CellIdSpec {
    fields: Vec<BitField>,
}

impl CellIdSpec {
    pub fn new(fields: Vec<BitField>) -> Result<Self> {
        let mut end = 0u32;
        for f in &fields {
            if f.width == 0 || f.offset + f.width > 64 {
                return Err(RecoError::config(format!(
                    "field '{}' does not fit in 64 bits (offset {}, width {})",
                    f.name, f.offset, f.width
                )));
            }
            if f.offset < end {
                return Err(RecoError::config(format!(
                    "field '{}' overlaps the previous field", f.name
                )));
            }
            end = f.offset + f.width;
        }
        Ok(Self { fields })
    }

    /// Parse a readout descriptor like `"system:8,sector:4,x:-12,y:-12"`.
    ///
    /// Each entry is `name:width` (offset runs on from the previous field)
    /// or `name:offset:width`; a negative width marks the field as signed.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut fields = Vec::new();
        let mut next_offset = 0u32;
        for entry in descriptor.split(',') {
            let parts: Vec<&str> = entry.trim().split(':').collect();
            let (name, offset, width_str) = match parts.as_slice() {
                [name, width] => (*name, next_offset, *width),
                [name, offset, width] => {
                    let off = offset.trim().parse::<u32>().map_err(|_| {
                        RecoError::config(format!("bad offset in descriptor entry '{}'", entry))
                    })?;
                    (*name, off, *width)
                }
                _ => {
                    return Err(RecoError::config(format!(
                        "bad descriptor entry '{}'", entry
                    )))
                }
            };
            let w = width_str.trim().parse::<i32>().map_err(|_| {
                RecoError::config(format!("bad width in descriptor entry '{}'", entry))
            })?;
            if w == 0 {
                return Err(RecoError::config(format!(
                    "zero width in descriptor entry '{}'", entry
                )));
            }
            fields.push(BitField {
                name: name.trim().to_string(),
                offset,
                width: w.unsigned_abs(),
                signed: w < 0,
            });
            next_offset = offset + w.unsigned_abs();
        }
        Self::new(fields)
    }

    pub fn fields(&self) -> &[BitField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&BitField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Index of a named field, for callers that pre-resolve lookups
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn decode(&self, cell_id: u64, field: &BitField) -> i64 {
        let raw = (cell_id >> field.offset) & field.mask();
        if field.signed {
            let sign_bit = 1u64 << (field.width - 1);
            if raw & sign_bit != 0 {
                return (raw | !field.mask()) as i64;
            }
        }
        raw as i64
    }

    pub fn decode_by_name(&self, cell_id: u64, name: &str) -> Result<i64> {
        let field = self
            .field(name)
            .ok_or_else(|| RecoError::UnknownField(name.to_string()))?;
        Ok(self.decode(cell_id, field))
    }

    /// Decode every field in declaration order
    pub fn decode_all(&self, cell_id: u64) -> Vec<i64> {
        self.fields.iter().map(|f| self.decode(cell_id, f)).collect()
    }

    /// Pack named values into a cell ID (used to build synthetic hits)
    pub fn encode(&self, values: &[(&str, i64)]) -> Result<u64> {
        let mut id = 0u64;
        for (name, value) in values {
            let field = self
                .field(name)
                .ok_or_else(|| RecoError::UnknownField(name.to_string()))?;
            id |= ((*value as u64) & field.mask()) << field.offset;
        }
        Ok(id)
    }
}
