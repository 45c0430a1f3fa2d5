use anyhow::{anyhow, Context};
use baromap_cli::{probe, USB_PID, USB_VID};
use std::io;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let connected_devices: Vec<nusb::DeviceInfo> = nusb::list_devices()
        .context("USB error while listing devices")?
        .collect();

    let ids = connected_devices
        .iter()
        .map(|di| (di.vendor_id(), di.product_id()));

    let ok = probe::run(&mut io::stdout().lock(), ids, || {
        open_target(&connected_devices)
    })?;

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn open_target(connected_devices: &[nusb::DeviceInfo]) -> anyhow::Result<()> {
    let target = connected_devices
        .iter()
        .find(|di| di.vendor_id() == USB_VID && di.product_id() == USB_PID)
        .ok_or_else(|| anyhow!("no device with ID {USB_VID:04x}:{USB_PID:04x} is connected"))?;

    target
        .open()
        .context("USB error while opening the device")?;

    Ok(())
}
