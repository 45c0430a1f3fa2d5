use anyhow::Context;
use baromap_cli::{blink, GPIO_CHIP, GPIO_LINE};
use embedded_hal::digital::OutputPin;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;
use std::thread;

// This does not blink the LED on the breakout itself (that one is hardwired
// to V_in), only whatever is attached to G0.
fn main() -> anyhow::Result<()> {
    let mut chip = Chip::new(GPIO_CHIP)
        .with_context(|| format!("Failed to open GPIO chip {GPIO_CHIP}"))?;
    let handle = chip
        .get_line(GPIO_LINE)
        .context("Failed to look up the output line")?
        .request(LineRequestFlags::OUTPUT, 0, "blink")
        .context("Failed to request the line as an output")?;
    let mut pin = CdevPin::new(handle).context("Failed to wrap the GPIO line")?;

    for phase in blink::phases() {
        println!("{}", phase.label);
        pin.set_state(phase.level)?;
        thread::sleep(phase.hold);
    }

    unreachable!("the blink schedule never ends")
}
