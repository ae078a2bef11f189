//! Byte-order reassembly and typed decode for Modbus register/coil data.

use iot_domain::error::{Error, Result};

use crate::model::{ByteOrder, DataField, FieldType};

/// Reassemble wire bytes into logical big-endian order. Never mutates the
/// input. `Cdab`/`Badc` only make sense for 4-byte operands; on any other
/// length they behave as `Abcd`.
pub fn reorder_bytes(bytes: &[u8], order: Option<ByteOrder>) -> Vec<u8> {
    match order {
        None | Some(ByteOrder::Abcd) => bytes.to_vec(),
        Some(ByteOrder::Dcba) => bytes.iter().rev().copied().collect(),
        Some(ByteOrder::Cdab) if bytes.len() == 4 => vec![bytes[2], bytes[3], bytes[0], bytes[1]],
        Some(ByteOrder::Badc) if bytes.len() == 4 => vec![bytes[1], bytes[0], bytes[3], bytes[2]],
        Some(_) => bytes.to_vec(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Extract and decode one field's bytes out of a whole-block byte buffer.
/// `block_start` is the block's starting address; `block` holds one byte
/// per bit (coil/discrete) or two bytes per register.
pub fn extract_and_decode(
    field: &DataField,
    block_start: u16,
    block_is_bits: bool,
    block_bytes: &[u8],
) -> Result<FieldValue> {
    if block_is_bits {
        let bit_offset = (field.address - block_start) as usize;
        let byte_idx = bit_offset / 8;
        let bit_idx = bit_offset % 8;
        let byte = block_bytes
            .get(byte_idx)
            .ok_or_else(|| Error::Validation(format!("field {} out of range", field.name)))?;
        return Ok(FieldValue::Bool((byte >> bit_idx) & 1 == 1));
    }

    let start_byte = (field.address - block_start) as usize * 2;
    let len_bytes = field.length.max(1) as usize * 2;
    let raw = block_bytes
        .get(start_byte..start_byte + len_bytes)
        .ok_or_else(|| Error::Validation(format!("field {} out of range", field.name)))?;

    decode_value(field, raw)
}

fn decode_value(field: &DataField, raw: &[u8]) -> Result<FieldValue> {
    let reordered = reorder_bytes(raw, field.byte_order);

    let scaled = |v: f64| -> f64 {
        match field.scale {
            Some(s) if s != 0.0 => v * s,
            _ => v,
        }
    };

    match field.field_type {
        FieldType::Bool => {
            if reordered.len() < 2 {
                return Err(Error::Validation(format!(
                    "field {} too short for bool",
                    field.name
                )));
            }
            let v = u16::from_be_bytes([reordered[0], reordered[1]]);
            Ok(FieldValue::Bool(v == 1))
        }
        FieldType::Int16 => {
            let v = i16::from_be_bytes(reordered[0..2].try_into().unwrap());
            Ok(FieldValue::Number(scaled(v as f64)))
        }
        FieldType::Uint16 => {
            let v = u16::from_be_bytes(reordered[0..2].try_into().unwrap());
            Ok(FieldValue::Number(scaled(v as f64)))
        }
        FieldType::Int32 => {
            let v = i32::from_be_bytes(reordered[0..4].try_into().unwrap());
            Ok(FieldValue::Number(scaled(v as f64)))
        }
        FieldType::Uint32 => {
            let v = u32::from_be_bytes(reordered[0..4].try_into().unwrap());
            Ok(FieldValue::Number(scaled(v as f64)))
        }
        FieldType::Float32 => {
            let v = f32::from_be_bytes(reordered[0..4].try_into().unwrap());
            Ok(FieldValue::Number(scaled(v as f64)))
        }
        FieldType::String => {
            let end = reordered
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(reordered.len());
            let s = String::from_utf8_lossy(&reordered[..end]).to_string();
            Ok(FieldValue::Text(s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_byte_orders() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            reorder_bytes(&bytes, Some(ByteOrder::Cdab)),
            vec![0x03, 0x04, 0x01, 0x02]
        );
        assert_eq!(
            reorder_bytes(&bytes, Some(ByteOrder::Dcba)),
            vec![0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(
            reorder_bytes(&bytes, Some(ByteOrder::Badc)),
            vec![0x02, 0x01, 0x04, 0x03]
        );
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn roundtrip_cdab_is_involution() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        let once = reorder_bytes(&bytes, Some(ByteOrder::Cdab));
        let twice = reorder_bytes(&once, Some(ByteOrder::Cdab));
        assert_eq!(twice, bytes);
    }

    #[test]
    fn decode_float32() {
        let field = DataField {
            name: "t".into(),
            field_type: FieldType::Float32,
            unit: None,
            scale: None,
            byte_order: Some(ByteOrder::Abcd),
            address: 0,
            length: 2,
        };
        let raw = 3.25f32.to_be_bytes();
        let v = decode_value(&field, &raw).unwrap();
        match v {
            FieldValue::Number(n) => assert!((n - 3.25).abs() < 0.001),
            _ => panic!("expected number"),
        }
    }

    #[test]
    fn decode_int16_with_scale() {
        let field = DataField {
            name: "s".into(),
            field_type: FieldType::Int16,
            unit: None,
            scale: Some(0.1),
            byte_order: None,
            address: 0,
            length: 1,
        };
        let raw = [0x00, 0x0A];
        let v = decode_value(&field, &raw).unwrap();
        match v {
            FieldValue::Number(n) => assert!((n - 1.0).abs() < 1e-9),
            _ => panic!("expected number"),
        }
    }
}
