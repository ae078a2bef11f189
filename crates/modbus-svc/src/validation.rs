use iot_domain::error::{Error, Result};

use crate::model::{FieldType, ModbusClient};

const MAX_NAME_LEN: usize = 254;

pub fn validate_modbus_client(c: &ModbusClient, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    if c.name.is_empty() || c.name.len() > MAX_NAME_LEN {
        return Err(Error::Validation("invalid name length".into()));
    }
    if c.port == 0 {
        return Err(Error::Validation("port must be nonzero".into()));
    }
    if c.data_fields.is_empty() {
        return Err(Error::Validation("data_fields must be nonempty".into()));
    }
    for field in &c.data_fields {
        if field.name.is_empty() {
            return Err(Error::Validation("field name must be nonempty".into()));
        }
        if field.field_type == FieldType::String && field.length == 0 {
            return Err(Error::Validation(
                "string fields require length >= 1".into(),
            ));
        }
    }
    c.scheduler.validate(now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ByteOrder, DataField, FunctionCode};
    use iot_domain::scheduler_spec::{Frequency, SchedulerSpec};

    fn client(fields: Vec<DataField>) -> ModbusClient {
        ModbusClient {
            id: uuid::Uuid::new_v4(),
            group_id: uuid::Uuid::new_v4(),
            thing_id: uuid::Uuid::new_v4(),
            name: "plc-1".into(),
            ip_address: "10.0.0.5".parse().unwrap(),
            port: 502,
            slave_id: 1,
            function_code: FunctionCode::ReadHoldingRegisters,
            scheduler: SchedulerSpec {
                time_zone: "UTC".into(),
                frequency: Frequency::Minutely,
                date_time: None,
                week: None,
                day_time: None,
                hour: None,
                minute: Some(5),
            },
            data_fields: fields,
            metadata: serde_json::Value::Null,
        }
    }

    fn field(name: &str, field_type: FieldType) -> DataField {
        DataField {
            name: name.into(),
            field_type,
            unit: None,
            scale: None,
            byte_order: Some(ByteOrder::Abcd),
            address: 0,
            length: 1,
        }
    }

    #[test]
    fn rejects_empty_data_fields() {
        let c = client(vec![]);
        assert!(validate_modbus_client(&c, chrono::Utc::now()).is_err());
    }

    #[test]
    fn rejects_unnamed_field() {
        let c = client(vec![field("", FieldType::Uint16)]);
        assert!(validate_modbus_client(&c, chrono::Utc::now()).is_err());
    }

    #[test]
    fn rejects_zero_length_string_field() {
        let mut f = field("label", FieldType::String);
        f.length = 0;
        let c = client(vec![f]);
        assert!(validate_modbus_client(&c, chrono::Utc::now()).is_err());
    }

    #[test]
    fn accepts_well_formed_client() {
        let c = client(vec![field("temperature", FieldType::Float32)]);
        assert!(validate_modbus_client(&c, chrono::Utc::now()).is_ok());
    }
}
