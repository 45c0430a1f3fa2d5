pub mod blink;
pub mod probe;
pub mod record;
pub mod timeseries;

// The breakout is sold by Adafruit but enumerates with Microchip's vendor ID
// (the MCP2221A keeps its stock USB descriptor)
pub const USB_VID: u16 = 0x04D8;
pub const USB_PID: u16 = 0x00DD;

/// I²C adapter node exposed by the kernel's hid-mcp2221 driver.
pub const I2C_BUS: &str = "/dev/i2c-1";

pub const GPIO_CHIP: &str = "/dev/gpiochip0";
/// G0 on the breakout.
pub const GPIO_LINE: u32 = 0;
