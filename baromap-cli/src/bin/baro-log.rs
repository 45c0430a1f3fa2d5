use anyhow::Context;
use baromap_cli::{record, I2C_BUS};
use chrono::Local;
use linux_embedded_hal::I2cdev;
use lps25::{DataRate, Lps25};
use std::thread;

fn main() -> anyhow::Result<()> {
    let i2c = I2cdev::new(I2C_BUS)
        .with_context(|| format!("Failed to open I²C bus {I2C_BUS}"))?;
    let mut sensor = Lps25::new(i2c);

    if !sensor.is_enabled().context("Failed to get sensor status")? {
        sensor.enable().context("Failed to enable sensor")?;
    }

    sensor
        .set_data_rate(DataRate::Hz25)
        .context("Failed to set sensor data rate")?;

    println!("{}", record::HEADER);

    loop {
        let pressure = sensor.pressure().context("Failed to read pressure")?;
        println!("{}", record::format_line(Local::now(), pressure));
        thread::sleep(record::POLL_INTERVAL);
    }
}
