//! Connect to a peripheral and print its whole GATT tree
//!
//! Scans until a peripheral with the given name (or any connectable
//! peripheral) shows up, connects, discovers every service,
//! characteristic and descriptor, and reads every readable value.
//!
//! Run with: cargo run --example load_peripheral -- --name "My Sensor"

use ble_central_bridge::{
    event_channel, Bluetooth, BtleplugBridge, CharacteristicProperty, Error, Result, ScanOptions,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,ble_central_bridge=debug")
        .init();

    let args: Vec<String> = std::env::args().collect();
    let target_name = args
        .iter()
        .position(|arg| arg == "--name")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let (events, receiver) = event_channel();
    let bridge = BtleplugBridge::new(events).await?;
    let bluetooth = Bluetooth::new(Arc::new(bridge));
    bluetooth.spawn_event_loop(receiver);

    let no_filter: &[&str] = &[];
    bluetooth.start_scan(no_filter, ScanOptions::default()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    bluetooth.stop_scan().await?;

    let peripheral = bluetooth
        .peripherals()
        .into_values()
        .filter(|p| match &target_name {
            Some(name) => p.name.as_deref() == Some(name.as_str()),
            None => p
                .advertisement_data
                .as_ref()
                .and_then(|a| a.is_connectable)
                .unwrap_or(true),
        })
        .max_by_key(|p| p.rssi.unwrap_or(i16::MIN))
        .ok_or_else(|| Error::PeripheralNotFound {
            id: target_name.clone().unwrap_or_else(|| "any".to_string()),
        })?;

    println!("Loading {} ({:?})...", peripheral.id, peripheral.name);
    let peripheral = bluetooth.load_peripheral(&peripheral.id).await?;

    for service in &peripheral.services {
        println!("Service {}", service.uuid);
        for characteristic in &service.characteristics {
            println!(
                "  Characteristic {} {:?}",
                characteristic.uuid, characteristic.properties
            );

            if characteristic.has_property(CharacteristicProperty::Read) {
                match bluetooth
                    .read_characteristic(&peripheral.id, &service.uuid, &characteristic.uuid)
                    .await
                {
                    Ok(Some(value)) => println!("    Value: {:02X?}", value.as_ref()),
                    Ok(None) => println!("    Value: (empty)"),
                    Err(e) => println!("    Read failed: {}", e),
                }
            }

            for descriptor in &characteristic.descriptors {
                println!("    Descriptor {}", descriptor.uuid);
            }
        }
    }

    match bluetooth.read_rssi(&peripheral.id).await {
        Ok(rssi) => println!("RSSI: {} dBm", rssi),
        Err(e) => println!("RSSI unavailable: {}", e),
    }

    bluetooth.disconnect(&peripheral.id).await?;
    println!("Disconnected");

    Ok(())
}
