use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use stationbus::{
    ConnectionId, DeviceId, DeviceNetwork, Frequency, OpenParams, Outbox, Packet, Payload,
    Transport, net_id, protocol,
};

use crate::config::StationConfig;

const DOOR_FREQUENCY: Frequency = 10;
const SENSOR_FREQUENCY: Frequency = 20;

/// A small demo station: a wired airlock controller driven by a button,
/// a handful of wireless pressure sensors, and a hand-held monitor
/// sniffing the wireless network.
pub struct Station {
    network: DeviceNetwork,
    positions: HashMap<DeviceId, Vec2>,
    button: ConnectionId,
    sensors: Vec<ConnectionId>,
    monitor: ConnectionId,
    door: ConnectionId,
    delivered: Rc<Cell<u64>>,
    tick: u32,
    config: StationConfig,
}

impl Station {
    pub fn new(config: StationConfig) -> anyhow::Result<Self> {
        let mut network = DeviceNetwork::new();
        let mut positions = HashMap::new();
        let delivered = Rc::new(Cell::new(0u64));
        let mut next_device = 1u64;
        let mut device = |pos: Option<Vec2>| {
            let id = DeviceId(next_device);
            next_device += 1;
            if let Some(pos) = pos {
                positions.insert(id, pos);
            }
            id
        };

        // Airlock controller: toggles on set_state and reports back.
        let door_delivered = Rc::clone(&delivered);
        let mut door_open = false;
        let door = network.open(
            OpenParams {
                network: net_id::WIRED,
                frequency: DOOR_FREQUENCY,
                address: Some("door-0".to_string()),
                device: device(None),
                transport: Transport::Wired,
                receive_all: false,
            },
            move |packet: &Packet, outbox: &mut Outbox| {
                door_delivered.set(door_delivered.get() + 1);
                if packet.payload().command() == Some(protocol::CMD_SET_STATE) {
                    door_open = !door_open;
                    log::info!(
                        "door-0: toggled by {} (now {})",
                        packet.sender_address(),
                        if door_open { "open" } else { "closed" }
                    );
                    let report = Payload::new()
                        .with(protocol::COMMAND, protocol::CMD_UPDATED_STATE)
                        .with("open", if door_open { "true" } else { "false" });
                    outbox.send(packet.frequency(), packet.sender_address(), report);
                }
            },
        )?;

        // The button that drives the airlock.
        let button_delivered = Rc::clone(&delivered);
        let button = network.open(
            OpenParams {
                network: net_id::WIRED,
                frequency: DOOR_FREQUENCY,
                address: Some("button-0".to_string()),
                device: device(None),
                transport: Transport::Wired,
                receive_all: false,
            },
            move |packet: &Packet, _: &mut Outbox| {
                button_delivered.set(button_delivered.get() + 1);
                log::info!(
                    "button-0: {} reports open={}",
                    packet.sender_address(),
                    packet.payload().get("open").unwrap_or("?")
                );
            },
        )?;

        // Wireless pressure sensors along a corridor.
        let mut sensors = Vec::with_capacity(config.sensor_count);
        for i in 0..config.sensor_count {
            let pos = Vec2::new(i as f32 * config.sensor_spacing, 0.0);
            let sensor = network.open(
                OpenParams {
                    network: net_id::WIRELESS,
                    frequency: SENSOR_FREQUENCY,
                    address: Some(format!("sensor-{i}")),
                    device: device(Some(pos)),
                    transport: Transport::wireless(config.wireless_range),
                    receive_all: false,
                },
                |_: &Packet, _: &mut Outbox| {},
            )?;
            sensors.push(sensor);
        }

        // Hand-held monitor: sniffs all wireless traffic in range.
        let monitor_delivered = Rc::clone(&delivered);
        let monitor = network.open(
            OpenParams {
                network: net_id::WIRELESS,
                frequency: SENSOR_FREQUENCY,
                address: Some("monitor-0".to_string()),
                device: device(Some(Vec2::ZERO)),
                transport: Transport::wireless(config.wireless_range),
                receive_all: true,
            },
            move |packet: &Packet, _: &mut Outbox| {
                monitor_delivered.set(monitor_delivered.get() + 1);
                log::info!(
                    "monitor-0: {} pressure={}",
                    packet.sender_address(),
                    packet.payload().get("pressure").unwrap_or("?")
                );
            },
        )?;

        Ok(Self {
            network,
            positions,
            button,
            sensors,
            monitor,
            door,
            delivered,
            tick: 0,
            config,
        })
    }

    pub fn tick_once(&mut self) {
        self.tick += 1;

        if self.tick % self.config.button_interval == 0 {
            let request = Payload::new().with(protocol::COMMAND, protocol::CMD_SET_STATE);
            self.network
                .send(self.button, DOOR_FREQUENCY, "door-0", request, &self.positions);
        }

        if self.tick % self.config.sensor_interval == 0 {
            for (i, &sensor) in self.sensors.iter().enumerate() {
                let pressure = 101.3 + (self.tick as f32 * 0.1) + i as f32;
                let reading = Payload::new()
                    .with(protocol::COMMAND, protocol::CMD_UPDATED_STATE)
                    .with("pressure", format!("{pressure:.1}"));
                self.network
                    .broadcast(sensor, SENSOR_FREQUENCY, reading, &self.positions);
            }
        }

        self.network.tick(&self.positions);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.get()
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn connection_count(&self) -> usize {
        self.network.connection_count(net_id::WIRED) + self.network.connection_count(net_id::WIRELESS)
    }

    /// Owner-driven teardown: every device closes its own connection.
    pub fn shutdown(&mut self) {
        self.network.close(self.button);
        self.network.close(self.door);
        self.network.close(self.monitor);
        for sensor in self.sensors.drain(..) {
            self.network.close(sensor);
        }
        log::debug!("station shut down, {} connections left", self.connection_count());
    }
}
