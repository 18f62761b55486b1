use embassy_time::Duration;

pub const CHANNEL_COUNT: usize = 3;

// Remote
pub const KEY_POLL_PERIOD: Duration = Duration::from_millis(10);
/// Longer than the 108 ms NEC repeat interval, with margin.
pub const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(110);

// Motors
pub const STEP_PULSES: u32 = 2;
pub const CHASSIS_PULSES: u32 = 10;
pub const AUTO_PROGRAM: [u32; CHANNEL_COUNT] = [20, 40, 20];
pub const AUTO_RUN_PERIOD: Duration = Duration::from_secs(2);
pub const STEP_FREQUENCY_HZ: u32 = 1_000;

/// Address of the remote to obey, from `IR_REMOTE_ADDRESS` at build time. Empty accepts any.
pub const IR_REMOTE_ADDRESS: Option<u8> = parse_address(env!("IR_REMOTE_ADDRESS"));

const fn parse_address(text: &str) -> Option<u8> {
    match u8::from_str_radix(text, 10) {
        Ok(address) => Some(address),
        Err(_) => None,
    }
}
