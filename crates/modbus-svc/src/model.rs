use iot_domain::scheduler_spec::SchedulerSpec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
}

impl FunctionCode {
    pub fn is_bit_oriented(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs
        )
    }

    /// Protocol-level max block length: 125 registers, 2000 bits.
    pub fn max_block_len(self) -> u16 {
        if self.is_bit_oriented() {
            2000
        } else {
            125
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    String,
}

impl FieldType {
    /// Register length required by this type. `String` is caller-supplied
    /// (must be >= 1) and not derived here.
    pub fn derived_length(self) -> Option<u16> {
        match self {
            FieldType::Bool | FieldType::Int16 | FieldType::Uint16 => Some(1),
            FieldType::Int32 | FieldType::Uint32 | FieldType::Float32 => Some(2),
            FieldType::String => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ByteOrder {
    Abcd,
    Dcba,
    Cdab,
    Badc,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub byte_order: Option<ByteOrder>,
    pub address: u16,
    #[serde(default)]
    pub length: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModbusClient {
    pub id: Uuid,
    pub group_id: Uuid,
    pub thing_id: Uuid,
    pub name: String,
    pub ip_address: std::net::IpAddr,
    pub port: u16,
    pub slave_id: u8,
    pub function_code: FunctionCode,
    pub scheduler: SchedulerSpec,
    pub data_fields: Vec<DataField>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ModbusClient {
    /// Fill in each field's `length` from its type where the type derives
    /// one; `string` fields keep their caller-supplied length.
    pub fn derive_field_lengths(&mut self) {
        for field in &mut self.data_fields {
            if let Some(len) = field.field_type.derived_length() {
                field.length = len;
            }
        }
    }
}
