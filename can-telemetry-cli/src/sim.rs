//! Synthetic frame producer
//!
//! Simulates battery boards (12 cell voltages, 5 temperatures each) drifting
//! along random trends, plus a GPS and a motor frame, and sends everything to
//! the listener in the text wire format.

use anyhow::{Context, Result};
use can_telemetry::{encode_frame, CancellationToken};
use rand::Rng;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

/// Cell voltages 1-3
const CV1_BASE: u32 = 0x12905301;
/// Cell voltages 4-6
const CV2_BASE: u32 = 0x12905381;
/// Cell voltages 7-9
const CV3_BASE: u32 = 0x12905401;
/// Cell voltages 10-12
const CV4_BASE: u32 = 0x12905481;
/// Temperatures 1-3
const CT1_BASE: u32 = 0x12905601;
/// Temperatures 4-5
const CT2_BASE: u32 = 0x12905681;
const GPS_CAN_ID: u32 = 0x18FEF3FE;
const MOTOR_CAN_ID: u32 = 0x0A7;

const CELLS_PER_BOARD: usize = 12;
const TEMPS_PER_BOARD: usize = 5;
const VOLTAGE_RANGE_MV: (f64, f64) = (3700.0, 4200.0);
const TEMP_RANGE_C: (f64, f64) = (20.0, 60.0);
const TEMP_SCALE: f64 = 0.1;

const GPS_BASE: (f64, f64) = (25.033964, 121.564468);
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Where and how fast to send
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub target: SocketAddr,
    pub rate_hz: f64,
    pub boards: Vec<u8>,
    /// Stop after this many cycles (None = until cancelled)
    pub cycles: Option<u64>,
}

/// Simulated state of one battery board
#[derive(Debug, Clone)]
struct BoardState {
    board_id: u8,
    voltages: [f64; CELLS_PER_BOARD],
    temperatures: [f64; TEMPS_PER_BOARD],
    voltage_trends: [f64; CELLS_PER_BOARD],
    temp_trends: [f64; TEMPS_PER_BOARD],
}

impl BoardState {
    fn new(board_id: u8, rng: &mut impl Rng) -> Self {
        Self {
            board_id,
            voltages: std::array::from_fn(|_| rng.gen_range(3800.0..4000.0)),
            temperatures: std::array::from_fn(|_| rng.gen_range(25.0..35.0)),
            voltage_trends: std::array::from_fn(|_| rng.gen_range(-1.0..1.0)),
            temp_trends: std::array::from_fn(|_| rng.gen_range(-0.5..0.5)),
        }
    }

    fn step(&mut self, dt: f64, rng: &mut impl Rng) {
        for (voltage, trend) in self.voltages.iter_mut().zip(self.voltage_trends.iter_mut()) {
            if rng.gen_bool(0.1) {
                *trend = rng.gen_range(-1.0..1.0);
            }
            *voltage = (*voltage + *trend * dt * 5.0).clamp(VOLTAGE_RANGE_MV.0, VOLTAGE_RANGE_MV.1);
        }

        for (temp, trend) in self.temperatures.iter_mut().zip(self.temp_trends.iter_mut()) {
            if rng.gen_bool(0.05) {
                *trend = rng.gen_range(-0.5..0.5);
            }
            *temp = (*temp + *trend * dt).clamp(TEMP_RANGE_C.0, TEMP_RANGE_C.1);
        }
    }

    /// Group byte followed by each value as a u16 LE raw value
    fn payload(&self, values: &[f64], scale: f64) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + values.len() * 2);
        data.push(self.board_id);
        for value in values {
            data.extend_from_slice(&phys_to_raw(*value, scale).to_le_bytes());
        }
        data
    }

    fn frames(&self) -> [(u32, Vec<u8>); 6] {
        [
            (CV1_BASE, self.payload(&self.voltages[0..3], 1.0)),
            (CV2_BASE, self.payload(&self.voltages[3..6], 1.0)),
            (CV3_BASE, self.payload(&self.voltages[6..9], 1.0)),
            (CV4_BASE, self.payload(&self.voltages[9..12], 1.0)),
            (CT1_BASE, self.payload(&self.temperatures[0..3], TEMP_SCALE)),
            (CT2_BASE, self.payload(&self.temperatures[3..5], TEMP_SCALE)),
        ]
    }
}

/// Convert a physical value to its unsigned 16-bit raw representation
fn phys_to_raw(value: f64, scale: f64) -> u16 {
    (value / scale).clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Random walk over every simulated board
pub struct BatterySimulator<R> {
    boards: Vec<BoardState>,
    rng: R,
}

impl<R: Rng> BatterySimulator<R> {
    pub fn new(board_ids: &[u8], mut rng: R) -> Self {
        let boards = board_ids
            .iter()
            .map(|&id| BoardState::new(id, &mut rng))
            .collect();
        Self { boards, rng }
    }

    /// Advance every board by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        for board in &mut self.boards {
            board.step(dt, &mut self.rng);
        }
    }

    /// Wire text of every frame for the current cycle
    pub fn frames(&mut self) -> Vec<String> {
        let mut frames: Vec<String> = self
            .boards
            .iter()
            .flat_map(|board| board.frames())
            .map(|(id, data)| encode_frame(id, &data))
            .collect();

        frames.push(encode_frame(GPS_CAN_ID, &self.gps_payload()));
        frames.push(encode_frame(MOTOR_CAN_ID, &self.motor_payload()));
        frames
    }

    /// Latitude and longitude around a fixed point, i32 LE in 1e-7 degrees
    fn gps_payload(&mut self) -> Vec<u8> {
        let lat = GPS_BASE.0 + self.rng.gen_range(-0.0005..0.0005);
        let lon = GPS_BASE.1 + self.rng.gen_range(-0.0005..0.0005);
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&((lat * 1e7) as i32).to_le_bytes());
        data.extend_from_slice(&((lon * 1e7) as i32).to_le_bytes());
        data
    }

    /// Current (A) and torque (Nm), i16 LE in tenths
    fn motor_payload(&mut self) -> Vec<u8> {
        let current: f64 = self.rng.gen_range(-100.0..100.0);
        let torque: f64 = self.rng.gen_range(-300.0..300.0);
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&((current * 10.0) as i16).to_le_bytes());
        data.extend_from_slice(&((torque * 10.0) as i16).to_le_bytes());
        data
    }
}

/// Send simulated frames until cancelled or the cycle limit is reached
///
/// Returns the number of datagrams sent.
pub fn run(config: &SimulatorConfig, token: &CancellationToken) -> Result<u64> {
    anyhow::ensure!(
        config.rate_hz > 0.0 && config.rate_hz.is_finite(),
        "Send rate must be a positive number, got {}",
        config.rate_hz
    );
    let interval = Duration::try_from_secs_f64(1.0 / config.rate_hz)
        .with_context(|| format!("Send rate {}Hz is too low", config.rate_hz))?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to open UDP socket")?;
    let mut simulator = BatterySimulator::new(&config.boards, rand::thread_rng());

    log::info!(
        "Starting CAN UDP sender - targeting {} at {}Hz",
        config.target,
        config.rate_hz
    );
    log::info!("Simulating boards: {:?}", config.boards);

    let start = Instant::now();
    let mut last_stats = Instant::now();
    let mut packets_sent = 0u64;
    let mut cycles = 0u64;

    while !token.is_cancelled() && config.cycles.map_or(true, |max| cycles < max) {
        let cycle_start = Instant::now();
        simulator.step(interval.as_secs_f64());

        for frame in simulator.frames() {
            match socket.send_to(frame.as_bytes(), config.target) {
                Ok(_) => packets_sent += 1,
                Err(e) => log::error!("Socket error: {}", e),
            }
        }
        cycles += 1;

        if last_stats.elapsed() >= STATS_INTERVAL {
            let elapsed = start.elapsed().as_secs_f64();
            log::info!(
                "Sent {} packets in {:.1}s ({:.1} packets/s)",
                packets_sent,
                elapsed,
                packets_sent as f64 / elapsed
            );
            last_stats = Instant::now();
        }

        if let Some(remaining) = interval.checked_sub(cycle_start.elapsed()) {
            token.sleep(remaining);
        }
    }

    log::info!("Simulation ended after {} packets", packets_sent);
    Ok(packets_sent)
}
