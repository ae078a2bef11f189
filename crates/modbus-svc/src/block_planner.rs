//! Greedy register/coil block planning: cover every field with the
//! smallest number of contiguous reads, each within the protocol's block
//! length limit.

use crate::model::{DataField, FunctionCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub start: u16,
    pub len: u16,
}

pub fn plan(fields: &[DataField], function_code: FunctionCode) -> Vec<Block> {
    let max_len = function_code.max_block_len();
    let mut sorted: Vec<&DataField> = fields.iter().collect();
    sorted.sort_by_key(|f| f.address);

    let mut blocks = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return blocks;
    };

    let mut start = first.address;
    let mut end = first.address + first.length.max(1) - 1;

    for field in iter {
        let field_end = field.address + field.length.max(1) - 1;
        let candidate_end = end.max(field_end);
        if candidate_end - start < max_len {
            end = candidate_end;
        } else {
            blocks.push(Block {
                start,
                len: end - start + 1,
            });
            start = field.address;
            end = field_end;
        }
    }
    blocks.push(Block {
        start,
        len: end - start + 1,
    });
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    fn field(address: u16, length: u16) -> DataField {
        DataField {
            name: "f".into(),
            field_type: FieldType::Uint16,
            unit: None,
            scale: None,
            byte_order: None,
            address,
            length,
        }
    }

    #[test]
    fn disjoint_addresses_yield_two_blocks() {
        let fields = vec![field(0, 1), field(200, 1)];
        let blocks = plan(&fields, FunctionCode::ReadHoldingRegisters);
        assert_eq!(
            blocks,
            vec![Block { start: 0, len: 1 }, Block { start: 200, len: 1 }]
        );
    }

    #[test]
    fn contiguous_addresses_merge() {
        let fields = vec![field(5, 1), field(0, 1), field(3, 1)];
        let blocks = plan(&fields, FunctionCode::ReadHoldingRegisters);
        assert_eq!(blocks, vec![Block { start: 0, len: 6 }]);
    }

    #[test]
    fn every_field_inside_exactly_one_block() {
        let fields = vec![field(0, 2), field(10, 4), field(300, 1)];
        let blocks = plan(&fields, FunctionCode::ReadHoldingRegisters);
        for f in &fields {
            let covering = blocks
                .iter()
                .filter(|b| f.address >= b.start && f.address + f.length <= b.start + b.len)
                .count();
            assert_eq!(covering, 1);
        }
        for b in &blocks {
            assert!(b.len <= FunctionCode::ReadHoldingRegisters.max_block_len());
        }
    }
}
