//! FieldTracker Firmware — Main Entry Point
//!
//! Hexagonal architecture with event-driven execution.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  BleCentral      GatewayAdapter   NvsAdapter   Esp32Time     │
//! │  (GattPort)      (PublishPort)    (Config+NVS)               │
//! │  GnssUart        LogEventSink     RoleLeds                   │
//! │  (NMEA feed)     (EventSink)      (mesh role indicator)      │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                 │    │
//! │  │  LNS client · Publisher · GNSS snapshot              │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::sync::atomic::{AtomicU8, Ordering};

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_hal::units::Hertz;

use fieldtracker::adapters::ble_central::{
    take_discovered, take_notification, take_read_result, BleCentral,
};
use fieldtracker::adapters::device_id;
use fieldtracker::adapters::gateway::{GatewayAdapter, GatewayFrame};
use fieldtracker::adapters::gnss_uart::GnssUart;
use fieldtracker::adapters::log_sink::LogEventSink;
use fieldtracker::adapters::nvs::NvsAdapter;
use fieldtracker::adapters::time::Esp32TimeAdapter;
use fieldtracker::app::events::AppEvent;
use fieldtracker::app::ports::{ConfigPort, EventSink};
use fieldtracker::app::service::AppService;
use fieldtracker::config::NodeConfig;
use fieldtracker::drivers::role_leds::RoleLeds;
use fieldtracker::events::{self, push_event, Event};

// ── Mesh role glue ────────────────────────────────────────────
//
// The Thread stack reports role changes on its own task.  The raw
// role lands in an atomic and the main loop is woken through the
// event queue, same as the BLE mailboxes.

static MESH_ROLE_RAW: AtomicU8 = AtomicU8::new(0);

unsafe extern "C" fn thread_state_changed(flags: u32, ctx: *mut core::ffi::c_void) {
    use esp_idf_svc::sys::{otChangedFlags_OT_CHANGED_THREAD_ROLE, otInstance, otThreadGetDeviceRole};

    if flags & otChangedFlags_OT_CHANGED_THREAD_ROLE == 0 {
        return;
    }
    let role = otThreadGetDeviceRole(ctx as *mut otInstance);
    MESH_ROLE_RAW.store(role as u8, Ordering::Release);
    push_event(Event::RoleChanged);
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  FieldTracker v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({e}), running with defaults and no persistence");
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({e}), using defaults");
            NodeConfig::default()
        }
    };
    let time_adapter = Esp32TimeAdapter::new();

    // ── 3. Device identity ────────────────────────────────────
    let eui = device_id::device_eui(&nvs);
    let nonce = nvs.bump_dev_nonce().unwrap_or(0);
    info!("Device EUI {eui}, join nonce {nonce}");

    // ── 4. Peripherals ────────────────────────────────────────
    let periph = Peripherals::take()?;

    let uart_cfg = UartConfig::new().baudrate(Hertz(config.gnss_baud));
    let uart = UartDriver::new(
        periph.uart1,
        periph.pins.gpio5,
        periph.pins.gpio4,
        Option::<esp_idf_hal::gpio::AnyIOPin>::None,
        Option::<esp_idf_hal::gpio::AnyIOPin>::None,
        &uart_cfg,
    )?;
    let mut gnss = GnssUart::new(uart);

    let mut leds = RoleLeds::new(
        PinDriver::output(periph.pins.gpio0.downgrade_output())?,
        PinDriver::output(periph.pins.gpio1.downgrade_output())?,
        PinDriver::output(periph.pins.gpio2.downgrade_output())?,
        PinDriver::output(periph.pins.gpio3.downgrade_output())?,
    );

    // ── 5. Network adapters ───────────────────────────────────
    //
    // Thread bring-up runs on the OpenThread task started by the
    // platform glue; we only hook the role callback here.
    unsafe {
        let instance = esp_idf_svc::sys::esp_openthread_get_instance();
        esp_idf_svc::sys::otSetStateChangedCallback(
            instance,
            Some(thread_state_changed),
            instance.cast(),
        );
    }

    let mut gateway = GatewayAdapter::new()?;
    let mut ble = match BleCentral::init() {
        Ok(b) => b,
        Err(e) => {
            log::error!("BLE central init failed: {e} — halting");
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };

    // ── 6. Construct app service ──────────────────────────────
    let mut log_sink = LogEventSink::new();
    let mut app = AppService::new(config.clone(), eui);
    app.start(&mut log_sink);

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    let ticks_per_publish =
        u64::from(config.publish_interval_secs) * 1000 / u64::from(config.tick_interval_ms);
    let ticks_per_heartbeat = 60_000 / u64::from(config.tick_interval_ms);
    let mut publish_counter: u64 = 0;
    let mut heartbeat_counter: u64 = 0;

    loop {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(
            config.tick_interval_ms,
        )));
        let now_ms = time_adapter.uptime_ms();

        push_event(Event::PollTick);
        publish_counter += 1;
        if publish_counter >= ticks_per_publish {
            push_event(Event::PublishTick);
            publish_counter = 0;
        }
        heartbeat_counter += 1;
        if heartbeat_counter >= ticks_per_heartbeat {
            push_event(Event::WatchdogTick);
            heartbeat_counter = 0;
        }

        // Receiver bytes arrive continuously; drain before the events
        // so a publish in this iteration sees the freshest altitude.
        gnss.service(&mut app);

        // Gateway datagrams (answers to our own requests).
        if let Some(frame) = gateway.poll() {
            match frame {
                GatewayFrame::GatewayInfo { gateway_id } => {
                    info!("Gateway {gateway_id} answered");
                    app.on_gateway_found(&mut gateway, &mut log_sink);
                }
                GatewayFrame::ConnectAck { accepted } => {
                    app.on_connect_ack(accepted, &mut gateway, &mut log_sink);
                }
                GatewayFrame::RegisterAck { topic_id, accepted } => {
                    app.on_register_ack(accepted, topic_id, &mut log_sink);
                }
                GatewayFrame::PublishAck { accepted } => {
                    app.on_publish_ack(accepted, &mut log_sink);
                }
                GatewayFrame::Disconnect => {
                    app.on_session_lost(&mut log_sink);
                }
            }
        }

        // Process all pending events.
        events::drain_events(|event| {
            match event {
                Event::PeerDisconnected => {
                    app.on_peer_disconnected(&mut log_sink);
                }

                Event::DiscoveryCompleted => {
                    if let Some(svc) = take_discovered() {
                        app.on_discovery_complete(&svc, now_ms, &mut ble, &mut log_sink);
                    }
                }

                Event::ValueNotified => {
                    if let Some(data) = take_notification() {
                        app.on_notification(&data);
                    }
                }

                Event::ReadCompleted => {
                    if let Some(result) = take_read_result() {
                        match &result {
                            Ok(data) => app.on_read_complete(now_ms, Ok(data)),
                            Err(e) => app.on_read_complete(now_ms, Err(*e)),
                        }
                    }
                }

                Event::RoleChanged => {
                    let raw = MESH_ROLE_RAW.load(Ordering::Acquire);
                    let role = app.on_role_changed(raw, &mut log_sink);
                    leds.indicate(role);
                }

                Event::FixUpdated => {
                    log_sink.emit(&AppEvent::FixReceived(app.fix_summary()));
                }

                Event::FixAborted => {
                    log_sink.emit(&AppEvent::FixAborted);
                }

                Event::PollTick => {
                    app.poll_tick(now_ms, &mut ble);
                }

                Event::PublishTick => {
                    if let Err(e) = app.publish_tick(&mut gateway, &mut log_sink) {
                        warn!("Publish cycle error: {e}");
                    }
                }

                Event::SessionAdvanced | Event::SessionLost => {
                    // Session callbacks run inline where the gateway
                    // frame is decoded; nothing left to do here.
                }

                Event::GnssSentence => {
                    // Lines are assembled inline in the UART drain.
                }

                Event::WatchdogTick => {
                    let gnss = match app.last_gnss() {
                        Some(rmc) if rmc.valid => "valid",
                        Some(_) => "no fix",
                        None => "silent",
                    };
                    info!(
                        "Heartbeat: up {} s, gnss {}",
                        time_adapter.uptime_secs(),
                        gnss
                    );
                }
            }
        });

        // Detached blink: keep the LEDs toggling while hunting.
        if !app.role().attached() {
            leds.indicate(app.role());
        }
    }
}
