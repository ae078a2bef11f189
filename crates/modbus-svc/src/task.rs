//! The Modbus task closure: plan blocks once at schedule time, then on
//! each fire acquire a rate-limit permit, read every block, decode each
//! field, and publish.

use std::sync::Arc;

use iot_domain::capability::{Publisher, ThingConfig};
use iot_domain::error::Result;
use iot_scheduler::{task_fn, TaskFn};
use serde_json::{json, Value};

use crate::block_planner::{self, Block};
use crate::codec::{self, FieldValue};
use crate::model::{DataField, FieldType, ModbusClient};
use crate::pool::ModbusConnPool;
use crate::rate_limiter::RateLimiterRegistry;

#[allow(clippy::too_many_arguments)]
pub fn build(
    client: ModbusClient,
    config: ThingConfig,
    pool: Arc<ModbusConnPool>,
    rate_limiter: Arc<RateLimiterRegistry>,
    publisher: Arc<dyn Publisher>,
    cancel: tokio_util::sync::CancellationToken,
) -> TaskFn {
    let blocks = block_planner::plan(&client.data_fields, client.function_code);
    task_fn(move || {
        let client = client.clone();
        let config = config.clone();
        let pool = pool.clone();
        let rate_limiter = rate_limiter.clone();
        let publisher = publisher.clone();
        let cancel = cancel.clone();
        let blocks = blocks.clone();
        async move {
            if let Err(e) = fire(
                &client,
                &config,
                &blocks,
                pool.as_ref(),
                rate_limiter.as_ref(),
                publisher.as_ref(),
                &cancel,
            )
            .await
            {
                tracing::warn!(client_id = %client.id, error = %e, "modbus fire failed");
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn fire(
    client: &ModbusClient,
    config: &ThingConfig,
    blocks: &[Block],
    pool: &ModbusConnPool,
    rate_limiter: &RateLimiterRegistry,
    publisher: &dyn Publisher,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<()> {
    let addr = std::net::SocketAddr::new(client.ip_address, client.port);

    if !rate_limiter.acquire(addr, cancel).await {
        tracing::info!(client_id = %client.id, "fire cancelled while waiting for rate limit permit");
        return Ok(());
    }

    let block_is_bits = client.function_code.is_bit_oriented();
    let mut payload = serde_json::Map::new();

    for block in blocks {
        let block_bytes = pool
            .read_block(addr, client.slave_id, client.function_code, *block)
            .await?;

        for field in client
            .data_fields
            .iter()
            .filter(|f| within(f.address, f.length.max(1), *block))
        {
            let value = codec::extract_and_decode(field, block.start, block_is_bits, &block_bytes)?;
            insert_value(&mut payload, field, value, block_is_bits);
        }
    }

    let prefix = config.publish_prefix.as_deref().unwrap_or("modbus");
    let subject = format!("{prefix}.{}.{}", client.thing_id, client.id);
    publisher.publish(&subject, Value::Object(payload)).await?;
    Ok(())
}

fn within(address: u16, length: u16, block: Block) -> bool {
    address >= block.start && address + length <= block.start + block.len
}

fn insert_value(
    payload: &mut serde_json::Map<String, Value>,
    field: &DataField,
    value: FieldValue,
    bare_bool: bool,
) {
    let json_value = match value {
        FieldValue::Bool(b) => json!(b),
        FieldValue::Number(n) => json!(n),
        FieldValue::Text(s) => json!(s),
    };
    // Coils/discrete inputs emit bare booleans; typed register fields get
    // the {value, unit?} wrapper.
    let wrapped = if bare_bool && field.field_type == FieldType::Bool {
        json_value
    } else {
        match &field.unit {
            Some(unit) => json!({ "value": json_value, "unit": unit }),
            None => json!({ "value": json_value }),
        }
    };
    payload.insert(field.name.clone(), wrapped);
}
