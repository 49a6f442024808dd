//! Codec and end-to-end request throughput.

use std::future::Future;
use std::io;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::runtime::Runtime;
use voltage_modbus_mux::codec::decode_read_response;
use voltage_modbus_mux::{
    ClientConfig, Connector, ModbusCodec, ModbusTcpClient, RegisterValue, SchemaItem,
};

/// In-memory gateway that answers every FC03 request with zeroed registers.
struct LoopbackGateway;

impl Connector for LoopbackGateway {
    type Stream = DuplexStream;

    fn connect(
        &self,
        _host: &str,
        _port: u16,
    ) -> impl Future<Output = io::Result<DuplexStream>> + Send {
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(serve(server));
        async move { Ok(client) }
    }
}

async fn serve(mut stream: DuplexStream) -> io::Result<()> {
    let mut request = [0u8; 12];
    loop {
        stream.read_exact(&mut request).await?;
        let count = u16::from_be_bytes([request[10], request[11]]);
        let data_len = usize::from(count) * 2;

        let mut response = Vec::with_capacity(9 + data_len);
        response.extend_from_slice(&request[..4]);
        response.extend_from_slice(&((3 + data_len) as u16).to_be_bytes());
        response.extend_from_slice(&[request[6], 0x03, data_len as u8]);
        response.resize(9 + data_len, 0);
        stream.write_all(&response).await?;
    }
}

fn mixed_schema(repeat: u16) -> Vec<SchemaItem> {
    vec![
        SchemaItem::word(repeat),
        SchemaItem::empty(1),
        SchemaItem::float(repeat).swapped(),
        SchemaItem::double_int(repeat),
        SchemaItem::binary(1),
    ]
}

fn mixed_values(repeat: u16) -> Vec<RegisterValue> {
    let mut values = Vec::new();
    values.extend((0..repeat).map(RegisterValue::Word));
    values.extend((0..repeat).map(|i| RegisterValue::Float(f32::from(i) * 0.5)));
    values.extend((0..repeat).map(|i| RegisterValue::DoubleInt(-i32::from(i))));
    values.push(RegisterValue::Binary([true; 16]));
    values
}

fn benchmark_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for repeat in [1u16, 8, 20] {
        let schema = mixed_schema(repeat);
        let values = mixed_values(repeat);

        group.bench_with_input(BenchmarkId::new("build_write", repeat), &repeat, |b, _| {
            b.iter(|| {
                ModbusCodec::build_write_request(1, 0, black_box(&schema), black_box(&values))
            })
        });

        let telegram = match ModbusCodec::build_read_request(1, 0, &schema) {
            Ok(telegram) => telegram,
            Err(e) => panic!("schema must fit a read: {}", e),
        };
        let mut response = vec![0u8; telegram.expected_response_len()];
        response[7] = 0x03;
        group.bench_with_input(BenchmarkId::new("decode_read", repeat), &repeat, |b, _| {
            b.iter(|| decode_read_response(black_box(&schema), black_box(&response)))
        });
    }

    group.finish();
}

fn benchmark_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let client = rt.block_on(async {
        let config = ClientConfig::new("loopback");
        let client = ModbusTcpClient::with_connector(config, LoopbackGateway).unwrap();
        client.wait_connected().await.unwrap();
        client
    });

    let mut group = c.benchmark_group("round_trip");
    for batch in [1u8, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                rt.block_on(async {
                    let reads: Vec<_> = (0..batch)
                        .map(|i| {
                            let client = client.clone();
                            tokio::spawn(async move {
                                client.read_holdings(i % 8 + 1, 0, &[SchemaItem::word(10)]).await
                            })
                        })
                        .collect();
                    for read in reads {
                        black_box(read.await.unwrap().unwrap());
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_codec, benchmark_round_trip);
criterion_main!(benches);
