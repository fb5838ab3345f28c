//! Basic example: Discover nearby BLE peripherals
//!
//! Run with: cargo run --example discover_peripherals
//!
//! To only report peripherals advertising a service:
//!   cargo run --example discover_peripherals -- --service 180D

use ble_central_bridge::{event_channel, Bluetooth, BtleplugBridge, Result, ScanOptions};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ble_central_bridge=debug".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let services: Vec<String> = args
        .iter()
        .position(|arg| arg == "--service")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .into_iter()
        .collect();

    let (events, receiver) = event_channel();
    let bridge = BtleplugBridge::new(events).await?;
    let bluetooth = Bluetooth::new(Arc::new(bridge));
    bluetooth.spawn_event_loop(receiver);

    let _state = bluetooth
        .observe_state(|state| println!("Central is {}", state))
        .await?;

    println!("Scanning for 10 seconds...\n");

    let _scan = bluetooth
        .start_scan_with_callback(services.as_slice(), ScanOptions::default(), |result| {
            let Some(peripheral) = &result.peripheral else {
                return;
            };

            println!("Discovered peripheral:");
            println!("  ID: {}", peripheral.id);
            println!("  Name: {:?}", peripheral.name);
            println!("  RSSI: {:?} dBm", peripheral.rssi);
            if let Some(advertisement) = &peripheral.advertisement_data {
                println!("  Services: {:?}", advertisement.service_uuids);
                if let Some(company) = advertisement.company_identifier() {
                    println!("  Manufacturer: 0x{:04X}", company);
                }
            }
        })
        .await?;

    tokio::time::sleep(Duration::from_secs(10)).await;
    bluetooth.stop_scan().await?;

    println!("\n=== Summary ===");
    let mut peripherals: Vec<_> = bluetooth.peripherals().into_values().collect();
    peripherals.sort_by_key(|p| std::cmp::Reverse(p.rssi.unwrap_or(i16::MIN)));
    for peripheral in peripherals {
        println!(
            "{:<40} {:>5} dBm  {}",
            peripheral.id,
            peripheral.rssi.map(|r| r.to_string()).unwrap_or_else(|| "?".into()),
            peripheral.name.as_deref().unwrap_or("(unnamed)")
        );
    }

    Ok(())
}
