//! Report/decide core of the `usb-probe` binary, kept free of USB calls so
//! it can run against simulated device lists.

use crate::USB_VID;
use std::fmt::Display;
use std::io::{self, Write};

/// Walks the `(vendor_id, product_id)` pairs of the connected devices,
/// reporting every match for [`USB_VID`], then calls `open_target` to open
/// the fixed target pair.
///
/// Returns `Ok(true)` if at least one device matched and the open call
/// succeeded, `Ok(false)` otherwise.
pub fn run<W, D, O, E>(out: &mut W, devices: D, open_target: O) -> io::Result<bool>
where
    W: Write,
    D: IntoIterator<Item = (u16, u16)>,
    O: FnOnce() -> Result<(), E>,
    E: Display,
{
    writeln!(out, "Probing for Adafruit USB devices…")?;

    let mut found_device = false;
    for (vendor_id, product_id) in devices {
        if vendor_id == USB_VID {
            writeln!(out, "OK: Found Adafruit device with product ID {product_id}!")?;
            found_device = true;
        }
    }

    if !found_device {
        writeln!(out, "Error: could not find Adafruit device(s).")?;
        return Ok(false);
    }

    // The scan above accepts any product ID under the vendor, while only
    // one fixed (vendor, product) pair is opened. The opened device is not
    // necessarily one of the reported matches.
    if let Err(e) = open_target() {
        writeln!(out, "Failed to open device: {e:#}")?;
        return Ok(false);
    }
    writeln!(out, "OK: Successfully opened device.")?;

    writeln!(out, "Done.")?;
    Ok(true)
}
