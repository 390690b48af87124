use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use megaio_core::sched::sleep_ms;
use megaio_core::{Bus, BusConfig, KeyWait, LedController, LinuxBus, RegisterTransport, RegisterWidth, LED_COUNT};

const USAGE: &str = "\
Usage: megaio [--bus PATH] [--base ADDR] <command>

Commands:
  led <chip>                          print the LED mask of chip 0 or 1
  led <chip> <mask>                   set the LED mask
  led <chip> <n> on|off               switch LED n (1-16)
  reg <addr> <register> [8|16|24]     read a raw register
  reg <addr> <register> <width> <val> write a raw register
  test <chip>                         walk the LEDs and ask for confirmation

Numbers accept decimal or 0x-prefixed hex.";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = load_config()?;
    apply_overrides(&mut config, &mut args)?;
    debug!("using {:?}", config);

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["led", chip] => {
            let leds = LedController::linux(config);
            println!("{:#06x}", leds.get_led_val(parse(chip)?)?);
        }
        ["led", chip, mask] => {
            let leds = LedController::linux(config);
            leds.set_led_val(parse(chip)?, parse(mask)?)?;
        }
        ["led", chip, led, state] => {
            let on = match *state {
                "on" => true,
                "off" => false,
                other => bail!("expected on or off, got {other}"),
            };
            let leds = LedController::linux(config);
            leds.set_led(parse(chip)?, parse(led)?, on)?;
        }
        ["reg", address, register, rest @ ..] => {
            let bus = LinuxBus::new(&config.bus_path);
            let mut regs = RegisterTransport::new(bus.open(parse(address)?)?);
            let register: u8 = parse(register)?;
            match rest {
                [] => dump(&mut regs, register, RegisterWidth::Word)?,
                [width] => dump(&mut regs, register, RegisterWidth::try_from(parse::<u32>(width)?)?)?,
                [width, value] => {
                    let width = RegisterWidth::try_from(parse::<u32>(width)?)?;
                    regs.write_register(register, parse(value)?, width)?;
                }
                _ => bail!(USAGE),
            }
        }
        ["test", chip] => {
            let leds = LedController::linux(config);
            if !led_walk(&leds, parse(chip)?)? {
                bail!("operator reported failing LEDs");
            }
        }
        ["help"] | ["--help"] | ["-h"] => println!("{USAGE}"),
        _ => bail!(USAGE),
    }
    Ok(())
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("megaio").join("config.json"))
}

fn load_config() -> Result<BusConfig> {
    let Some(path) = config_path().filter(|p| p.exists()) else {
        return Ok(BusConfig::default());
    };
    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    info!("loaded {}", path.display());
    Ok(config)
}

/// Strips `--bus` and `--base` (with their values) out of `args`.
fn apply_overrides(config: &mut BusConfig, args: &mut Vec<String>) -> Result<()> {
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.drain(..);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--bus" => {
                let path = iter.next().ok_or_else(|| anyhow!("--bus needs a path"))?;
                config.bus_path = path.into();
            }
            "--base" => {
                let base = iter.next().ok_or_else(|| anyhow!("--base needs an address"))?;
                config.base_address = parse(&base)?;
            }
            _ => rest.push(arg),
        }
    }
    drop(iter);
    *args = rest;
    Ok(())
}

fn parse<T>(text: &str) -> Result<T>
where
    T: TryFrom<u64>,
{
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    }
    .with_context(|| format!("not a number: {text}"))?;
    T::try_from(value).map_err(|_| anyhow!("{text} is out of range"))
}

fn dump<D>(regs: &mut RegisterTransport<D>, register: u8, width: RegisterWidth) -> Result<()>
where
    D: std::io::Read + std::io::Write,
{
    let value = regs.read_register(register, width)?;
    let bytes = &value.to_be_bytes()[4 - width.bytes()..];
    println!("{register:#04x}: {}", hex::encode(bytes));
    Ok(())
}

/// Lights each LED in turn, then asks the operator whether all of them lit.
/// The original mask is put back either way.
fn led_walk<B: Bus>(leds: &LedController<B>, chip: u8) -> Result<bool> {
    let saved = leds.get_led_val(chip)?;

    for led in 0..LED_COUNT {
        leds.set_led_val(chip, 1 << led)?;
        sleep_ms(100);
    }
    leds.set_led_val(chip, 0xffff)?;

    println!("Did all LEDs light? (y/n)");
    let answer = KeyWait::stdin()?.wait();
    println!();

    leds.set_led_val(chip, saved.into())?;
    Ok(answer?)
}
