//! Voltage Modbus Mux Demo
//!
//! Walks through the gateway client:
//! - Schema-driven telegram building (no connection required)
//! - Word order for 32-bit values
//! - Concurrent reads through one gateway connection, with statistics
//!
//! Usage: cargo run --bin demo [gateway_host] [port]
//! Example: cargo run --bin demo 127.0.0.1 502

use std::time::Duration;

use tokio::time::timeout;
use voltage_modbus_mux::{
    ClientConfig, ModbusCodec, ModbusTcpClient, RegisterValue, SchemaItem, WordOrder,
    DEFAULT_TCP_PORT,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 {}", voltage_modbus_mux::info());
    println!("=============================================\n");

    // =========================================================================
    // Part 1: Schema Telegrams (No connection required)
    // =========================================================================
    println!("📦 Part 1: Schema Telegrams");
    println!("---------------------------");

    let schema = [
        SchemaItem::word(2),
        SchemaItem::empty(1),
        SchemaItem::float(1).swapped(),
        SchemaItem::binary(1),
    ];
    let read = ModbusCodec::build_read_request(1, 0, &schema)?;
    println!(
        "  FC03 request ({} bytes, expects {}): {:02X?}",
        read.len(),
        read.expected_response_len(),
        read.as_bytes()
    );

    let values = [
        RegisterValue::Word(1234),
        RegisterValue::Word(5678),
        RegisterValue::Float(25.5),
        RegisterValue::Binary(voltage_modbus_mux::value::unpack_bits(0b101)),
    ];
    let write = ModbusCodec::build_write_request(1, 10, &schema, &values)?;
    println!("  FC16 request ({} bytes): {:02X?}", write.len(), write.as_bytes());

    // =========================================================================
    // Part 2: Word Order
    // =========================================================================
    println!("\n🔄 Part 2: Word Order");
    println!("---------------------");

    let wire = [0x00, 0x00, 0x42, 0x48]; // 50.0 with swapped words
    for order in [WordOrder::BigEndian, WordOrder::BigEndianSwap] {
        let value = f32::from_be_bytes(voltage_modbus_mux::wire_to_value_bytes(&wire, order));
        println!("  {} -> f32: {:.2}", order, value);
    }

    // =========================================================================
    // Part 3: Gateway Client (requires a Modbus TCP gateway)
    // =========================================================================
    println!("\n🔌 Part 3: Gateway Client");
    println!("-------------------------");

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_TCP_PORT);

    let client = ModbusTcpClient::new(ClientConfig::new(host).with_port(port))?;
    println!("  Connecting to {}...", client.address());

    if timeout(Duration::from_secs(3), client.wait_connected())
        .await
        .is_err()
    {
        println!("  ⚠️  Gateway not reachable ({})", client.connection_state());
        println!("  (This is expected if no gateway is running)");
        println!("\n🎉 Demo completed! (gateway operations skipped)");
        return Ok(());
    }
    println!("  ✅ Connected");

    // One read per slave, all in flight at once
    let reads: Vec<_> = (1..=4u8)
        .map(|slave_id| {
            let client = client.clone();
            tokio::spawn(async move {
                let result = client.read_holdings(slave_id, 0, &[SchemaItem::word(4)]).await;
                (slave_id, result)
            })
        })
        .collect();

    println!("\n  📖 Read Operations:");
    for read in reads {
        let (slave_id, result) = read.await?;
        match result {
            Ok(values) => println!("    Slave {}: {:?}", slave_id, values),
            Err(e) => println!("    Slave {}: {}", slave_id, e),
        }
    }

    println!("\n  ✏️  Write Operations:");
    match client
        .write_holdings(1, 200, &[SchemaItem::float(1)], &[RegisterValue::Float(98.6)])
        .await
    {
        Ok(ack) => println!("    FC16 wrote {} registers at {}", ack.quantity, ack.address),
        Err(e) => println!("    FC16 Error: {}", e),
    }

    let stats = client.stats().await?;
    println!("\n  📊 Statistics:");
    println!(
        "    Sent: {}, Received: {}, Timeouts: {}",
        stats.requests_sent, stats.responses_received, stats.timeouts
    );
    for (slave_id, slave) in &stats.slaves {
        println!("    Slave {}: {:?}", slave_id, slave.health);
    }

    client.close().await?;
    println!("\n🎉 Demo completed!");

    Ok(())
}
