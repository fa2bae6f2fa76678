//! Kinescope - Stream Display Firmware
//!
//! Main firmware binary for the Raspberry Pi Pico W. Brings up a Wi-Fi
//! access point, receives fragmented JPEG frames over UDP and draws them
//! on an ST7796 panel.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{Ipv4Address, Ipv4Cidr, StackResources, StaticConfigV4};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::spi::{Config as SpiConfig, Spi};
use embassy_sync::mutex::Mutex;
use embassy_time::Delay;
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_probe as _};

use kinescope_core::config::StreamConfig;
use kinescope_core::reassembly::FrameReassembler;
use kinescope_core::render::RenderPipeline;
use kinescope_core::telemetry::Telemetry;
use kinescope_drivers::{St7796, ZuneTileDecoder};
use kinescope_protocol::MAX_DATAGRAM_SIZE;

use crate::heap::HeapProbe;
use crate::net::UdpIngress;
use crate::tasks::{FrameLock, RenderLock};

mod config;
mod heap;
mod net;
mod tasks;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

/// Panel SPI clock
const PANEL_SPI_HZ: u32 = 62_500_000;

/// Datagrams the socket can queue between ingest cycles
const RX_DATAGRAMS: usize = 8;

/// Seed for the network stack's port and sequence randomization
const NET_SEED: u64 = 0x4b49_4e45_5343_4f50;

static TELEMETRY: Telemetry = Telemetry::new();

// Static cells for radio, network and pipeline state (must live forever)
static CYW43_STATE: StaticCell<cyw43::State> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static RX_META: StaticCell<[PacketMetadata; RX_DATAGRAMS]> = StaticCell::new();
static RX_BUF: ConstStaticCell<[u8; RX_DATAGRAMS * MAX_DATAGRAM_SIZE]> =
    ConstStaticCell::new([0u8; RX_DATAGRAMS * MAX_DATAGRAM_SIZE]);
static TX_META: StaticCell<[PacketMetadata; 1]> = StaticCell::new();
static TX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static FRAME: StaticCell<FrameLock> = StaticCell::new();
static RENDER: StaticCell<RenderLock> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Kinescope firmware starting...");

    // Initialize heap allocator
    heap::init();

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let stream = StreamConfig::DEFAULT;

    // Frame buffers first: everything else is optional by comparison
    let reassembler = match FrameReassembler::new(&stream, &TELEMETRY) {
        Ok(reassembler) => reassembler,
        Err(e) => {
            error!("Frame reassembler init failed: {:?}", e);
            panic!("frame reassembler");
        }
    };
    let frame: &'static FrameLock = FRAME.init(Mutex::new(reassembler));

    // Pico W radio: PWR=GPIO23, CS=GPIO25, DIO=GPIO24, CLK=GPIO29
    let fw = include_bytes!(concat!(env!("OUT_DIR"), "/43439A0.bin"));
    let clm = include_bytes!(concat!(env!("OUT_DIR"), "/43439A0_clm.bin"));

    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = cyw43_pio::PioSpi::new(
        &mut pio.common,
        pio.sm0,
        cyw43_pio::DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    let state = CYW43_STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.spawn(unwrap!(tasks::cyw43_task(runner)));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::None)
        .await;
    info!("Radio initialized");

    let net_config = embassy_net::Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(Ipv4Address::from(config::AP_ADDRESS), config::AP_PREFIX_LEN),
        dns_servers: heapless::Vec::new(),
        gateway: None,
    });
    let (stack, net_runner) = embassy_net::new(
        net_device,
        net_config,
        NET_RESOURCES.init(StackResources::new()),
        NET_SEED,
    );
    spawner.spawn(unwrap!(tasks::net_task(net_runner)));

    control
        .start_ap_wpa2(config::AP_SSID, config::AP_PASSWORD, config::AP_CHANNEL)
        .await;
    // Onboard LED marks the access point as up
    control.gpio_set(0, true).await;
    info!(
        "Access point '{}' up on channel {}, address {}",
        config::AP_SSID,
        config::AP_CHANNEL,
        config::AP_ADDRESS
    );

    let mut socket = UdpSocket::new(
        stack,
        RX_META.init([PacketMetadata::EMPTY; RX_DATAGRAMS]),
        RX_BUF.take(),
        TX_META.init([PacketMetadata::EMPTY; 1]),
        TX_BUF.init([0u8; 64]),
    );
    if let Err(e) = socket.bind(config::UDP_PORT) {
        error!("UDP bind to port {} failed: {:?}", config::UDP_PORT, e);
        panic!("udp bind");
    }
    info!("Listening on UDP port {}", config::UDP_PORT);

    // Panel on SPI1: CLK=GPIO10, MOSI=GPIO11, CS=GPIO9, DC=GPIO8
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = PANEL_SPI_HZ;
    let panel_spi = Spi::new_blocking_txonly(p.SPI1, p.PIN_10, p.PIN_11, spi_config);
    let panel_cs = Output::new(p.PIN_9, Level::High);
    let panel_dc = Output::new(p.PIN_8, Level::High);

    let mut panel = St7796::new(panel_spi, panel_cs, panel_dc);
    if let Err(e) = panel.init(&mut Delay) {
        error!("Panel init failed: {:?}", e);
        panic!("panel init");
    }
    if let Err(e) = panel.clear() {
        error!("Panel clear failed: {:?}", e);
        panic!("panel clear");
    }
    info!("Panel ready");

    let Some(decoder) =
        ZuneTileDecoder::new(config::DECODER_MAX_WIDTH, config::DECODER_MAX_HEIGHT)
    else {
        error!(
            "No heap for a {}x{} decoder",
            config::DECODER_MAX_WIDTH,
            config::DECODER_MAX_HEIGHT
        );
        panic!("decoder scratch");
    };

    let pipeline = match RenderPipeline::new(&stream, panel, decoder, &HeapProbe) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Render pipeline init failed: {:?}", e);
            panic!("render pipeline");
        }
    };
    if pipeline.is_buffered() {
        info!("Rendering through pixel buffer, {}-row strips", pipeline.strip_height());
    } else {
        warn!("Not enough heap for a pixel buffer, drawing tiles directly");
    }
    let render: &'static RenderLock = RENDER.init(Mutex::new(pipeline));

    // Spawn tasks
    spawner.spawn(unwrap!(tasks::ingest_task(
        frame,
        UdpIngress::new(socket, &TELEMETRY)
    )));
    spawner.spawn(unwrap!(tasks::render_task(frame, render, &TELEMETRY, stream)));
    spawner.spawn(unwrap!(tasks::monitor_task(&TELEMETRY)));

    info!("All tasks spawned, firmware running");

    // Keep the radio control handle alive; all work happens in spawned tasks
    let _control = control;
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
