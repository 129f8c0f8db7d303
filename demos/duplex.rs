//! Duplex node: announces itself on a jittered 2-3 s interval and renders
//! every packet it hears on an SSD1306 OLED, using the interrupt-driven
//! receive path.

use clap::Parser;
use std::error::Error;
use std::thread;
use std::time::Duration;

use chrono::prelude::*;
use log::warn;
use rand::Rng;

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use linux_embedded_hal::I2cdev;
use ssd1306::{prelude::*, I2CDisplayInterface, Ssd1306};

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use sx127x::{blink_led, hardware_reset, Dio0Pin, LoRa, Parameters, SpiBus};

const INTERVAL_BASE_MS: u64 = 2000;
const INTERVAL_JITTER_MS: u64 = 1000;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Name this node announces in its messages
    #[arg(short, long, default_value = "NODE 0")]
    name: String,

    /// Center frequency in Hz; must be one of the supported table entries
    #[arg(short, long, default_value_t = 433_000_000)]
    frequency: u32,

    /// BCM pin wired to the radio's DIO0 line
    #[arg(long, default_value_t = 22)]
    dio0_pin: u8,

    /// BCM pin driving chip select
    #[arg(long, default_value_t = 7)]
    cs_pin: u8,

    /// BCM pin driving the radio's reset line
    #[arg(long, default_value_t = 25)]
    reset_pin: u8,

    /// BCM pin of the activity LED
    #[arg(long, default_value_t = 17)]
    led_pin: u8,
}

fn render_oled(line1: &str, line2: &str) -> Result<(), Box<dyn Error>> {
    let i2c = I2cdev::new("/dev/i2c-1")?;
    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    display.init().map_err(|err| format!("display init: {:?}", err))?;

    let text_style = MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build();

    Text::with_baseline(line1, Point::zero(), text_style, Baseline::Top)
        .draw(&mut display)
        .map_err(|err| format!("display draw: {:?}", err))?;
    Text::with_baseline(line2, Point::new(0, 16), text_style, Baseline::Top)
        .draw(&mut display)
        .map_err(|err| format!("display draw: {:?}", err))?;

    display.flush().map_err(|err| format!("display flush: {:?}", err))?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    hardware_reset(cli.reset_pin)?;

    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss1, 4_000_000, Mode::Mode0)?;
    let dio0 = Dio0Pin::new(cli.dio0_pin)?;
    let lora = LoRa::new(
        SpiBus::new(spi, Some(cli.cs_pin)),
        Some(Box::new(dio0)),
        Parameters {
            frequency: cli.frequency,
            ..Parameters::default()
        },
    );
    lora.init()?;

    let led_pin = cli.led_pin;
    lora.on_receive(move |lora, payload| {
        if let Err(err) = blink_led(led_pin, 1, 50) {
            warn!("led blink failed: {}", err);
        }

        let message = String::from_utf8_lossy(payload);
        let rssi = lora.packet_rssi().unwrap_or(0);
        println!(
            "RX: [{}] [RSSI: {}] {}",
            Utc::now().round_subsecs(2).time(),
            rssi,
            message
        );
        if let Err(err) = render_oled(&message, &format!("RSSI {}", rssi)) {
            warn!("oled render failed: {}", err);
        }
    })?;

    let mut rng = rand::thread_rng();
    let mut msg_count: u32 = 0;
    loop {
        let message = format!("{} {}", cli.name, msg_count);
        println!("TX: [{}] {}", Utc::now().round_subsecs(2).time(), message);
        lora.println(&message)?;
        msg_count += 1;

        // back to listening until the next announcement
        lora.receive(None)?;

        let jitter = rng.gen_range(0..INTERVAL_JITTER_MS);
        thread::sleep(Duration::from_millis(INTERVAL_BASE_MS + jitter));
    }
}
