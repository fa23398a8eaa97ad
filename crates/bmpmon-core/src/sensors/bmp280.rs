//! Bosch BMP280 barometric pressure and temperature sensor.
//!
//! Every read triggers one forced-mode measurement, waits for the
//! conversion, and applies the double-precision compensation formulas from
//! the BMP280 datasheet (section 8.1) using the factory calibration block.

use std::thread;
use std::time::Duration;

use crate::error::SensorError;
use crate::sampler::Sensor;

use super::i2c::RegisterBus;

const REG_CALIB: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_RESET: u8 = 0xE0;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

/// Value of `REG_CHIP_ID` on a BMP280.
pub const CHIP_ID: u8 = 0x58;
const RESET_COMMAND: u8 = 0xB6;
const MODE_FORCED: u8 = 0b01;

const STATUS_MEASURING: u8 = 0b1000;
const STATUS_IM_UPDATE: u8 = 0b0001;

/// Data registers report this value when a measurement was skipped.
const ADC_SKIPPED: i32 = 0x80000;

const STARTUP_DELAY: Duration = Duration::from_millis(2);
const POLL_INTERVAL: Duration = Duration::from_millis(2);
const MAX_STATUS_POLLS: u32 = 25;

/// Standard sea-level pressure in pascals.
pub const SEA_LEVEL_PA: f64 = 101_325.0;
const PA_TO_MMHG: f64 = 0.007_500_616_83;

/// Oversampling presets from the datasheet's recommended modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accuracy {
    UltraLowPower,
    LowPower,
    #[default]
    Standard,
    HighResolution,
    UltraHighResolution,
}

impl Accuracy {
    /// `(osrs_t, osrs_p)` register field values.
    fn oversampling(self) -> (u8, u8) {
        match self {
            Self::UltraLowPower => (0b001, 0b001),
            Self::LowPower => (0b001, 0b010),
            Self::Standard => (0b001, 0b011),
            Self::HighResolution => (0b001, 0b100),
            Self::UltraHighResolution => (0b010, 0b101),
        }
    }

    /// Typical conversion time, used before the first status poll.
    fn measurement_time(self) -> Duration {
        let (osrs_t, osrs_p) = self.oversampling();
        let samples = |osrs: u8| f64::from(1u32 << (osrs - 1));
        let ms = 1.0 + 2.0 * samples(osrs_t) + 2.0 * samples(osrs_p) + 0.5;
        Duration::from_secs_f64(ms / 1000.0)
    }

    fn ctrl_meas(self) -> u8 {
        let (osrs_t, osrs_p) = self.oversampling();
        (osrs_t << 5) | (osrs_p << 2) | MODE_FORCED
    }
}

/// Factory trimming parameters (`dig_T1`..`dig_P9`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    /// Decode the 24-byte little-endian block at 0x88..=0x9F.
    pub fn from_bytes(raw: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Returns `(celsius, t_fine)`.
    pub fn compensate_temperature(&self, adc_t: i32) -> (f64, f64) {
        let adc_t = f64::from(adc_t);
        let t1 = f64::from(self.t1);
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(self.t2);
        let d = adc_t / 131072.0 - t1 / 8192.0;
        let var2 = d * d * f64::from(self.t3);
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in pascals, or `None` when the calibration would divide by zero.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: f64) -> Option<f64> {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.p4) * 65536.0;
        var1 = (f64::from(self.p3) * var1 * var1 / 524288.0 + f64::from(self.p2) * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            return None;
        }
        let mut p = 1048576.0 - f64::from(adc_p);
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        var1 = f64::from(self.p9) * p * p / 2147483648.0;
        var2 = p * f64::from(self.p8) / 32768.0;
        Some(p + (var1 + var2 + f64::from(self.p7)) / 16.0)
    }
}

/// International barometric formula, metres above the standard sea level.
pub fn altitude_from_pressure(pressure_pa: f64) -> f64 {
    44330.0 * (1.0 - (pressure_pa / SEA_LEVEL_PA).powf(1.0 / 5.255))
}

pub fn pa_to_mmhg(pressure_pa: f64) -> f64 {
    pressure_pa * PA_TO_MMHG
}

/// BMP280 driver over any [`RegisterBus`].
pub struct Bmp280<B: RegisterBus> {
    bus: B,
    calibration: Calibration,
    accuracy: Accuracy,
    name: String,
}

impl<B: RegisterBus> Bmp280<B> {
    pub fn new(bus: B, name: impl Into<String>) -> Result<Self, SensorError> {
        Self::with_accuracy(bus, name, Accuracy::default())
    }

    /// Verify the chip id, soft-reset the device and load its calibration.
    pub fn with_accuracy(
        mut bus: B,
        name: impl Into<String>,
        accuracy: Accuracy,
    ) -> Result<Self, SensorError> {
        let found = bus.read_register(REG_CHIP_ID)?;
        if found != CHIP_ID {
            return Err(SensorError::InvalidChipId {
                expected: CHIP_ID,
                found,
            });
        }

        bus.write_register(REG_RESET, RESET_COMMAND)?;
        thread::sleep(STARTUP_DELAY);
        wait_for_status(&mut bus, STATUS_IM_UPDATE)?;

        let mut raw = [0u8; 24];
        bus.read_registers(REG_CALIB, &mut raw)?;
        let calibration = Calibration::from_bytes(&raw);
        if calibration.p1 == 0 {
            return Err(SensorError::InvalidData("pressure calibration dig_P1 is zero"));
        }

        // Filter off; standby time is irrelevant in forced mode.
        bus.write_register(REG_CONFIG, 0x00)?;

        Ok(Self {
            bus,
            calibration,
            accuracy,
            name: name.into(),
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    /// Run one forced conversion and return raw `(adc_t, adc_p)`.
    fn measure(&mut self) -> Result<(i32, i32), SensorError> {
        self.bus
            .write_register(REG_CTRL_MEAS, self.accuracy.ctrl_meas())?;
        thread::sleep(self.accuracy.measurement_time());
        wait_for_status(&mut self.bus, STATUS_MEASURING)?;

        let mut data = [0u8; 6];
        self.bus.read_registers(REG_DATA, &mut data)?;
        let adc = |b: &[u8]| (i32::from(b[0]) << 12) | (i32::from(b[1]) << 4) | (i32::from(b[2]) >> 4);
        Ok((adc(&data[3..6]), adc(&data[0..3])))
    }

    /// Temperature in °C and pressure in Pa from one conversion.
    fn read_compensated(&mut self) -> Result<(f64, f64), SensorError> {
        let (adc_t, adc_p) = self.measure()?;
        if adc_t == ADC_SKIPPED {
            return Err(SensorError::InvalidData("temperature measurement skipped"));
        }
        if adc_p == ADC_SKIPPED {
            return Err(SensorError::InvalidData("pressure measurement skipped"));
        }
        let (celsius, t_fine) = self.calibration.compensate_temperature(adc_t);
        let pressure = self
            .calibration
            .compensate_pressure(adc_p, t_fine)
            .ok_or(SensorError::InvalidData("pressure compensation divided by zero"))?;
        Ok((celsius, pressure))
    }
}

impl<B: RegisterBus> Sensor for Bmp280<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_temperature(&mut self) -> Result<f64, SensorError> {
        let (adc_t, _) = self.measure()?;
        if adc_t == ADC_SKIPPED {
            return Err(SensorError::InvalidData("temperature measurement skipped"));
        }
        Ok(self.calibration.compensate_temperature(adc_t).0)
    }

    fn read_pressure(&mut self) -> Result<f64, SensorError> {
        let (_, pressure_pa) = self.read_compensated()?;
        Ok(pa_to_mmhg(pressure_pa))
    }

    fn read_altitude(&mut self) -> Result<f64, SensorError> {
        let (_, pressure_pa) = self.read_compensated()?;
        Ok(altitude_from_pressure(pressure_pa))
    }
}

/// Poll the status register until `mask` clears.
fn wait_for_status<B: RegisterBus>(bus: &mut B, mask: u8) -> Result<(), SensorError> {
    for _ in 0..MAX_STATUS_POLLS {
        if bus.read_register(REG_STATUS)? & mask == 0 {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }
    Err(SensorError::Timeout {
        attempts: MAX_STATUS_POLLS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    // Datasheet example trimming values.
    const CALIB: [u8; 24] = [
        112, 107, 67, 103, 24, 252, 125, 142, 67, 214, 208, 11, 39, 11, 140, 0, 249, 255, 140, 60,
        248, 198, 112, 23,
    ];
    // adc_P = 415148, adc_T = 519888.
    const DATA: [u8; 6] = [101, 90, 192, 126, 237, 0];

    /// In-memory register map.
    struct FakeBus {
        regs: [u8; 256],
        writes: Vec<(u8, u8)>,
        stuck_measuring: bool,
    }

    impl FakeBus {
        fn bmp280() -> Self {
            let mut regs = [0u8; 256];
            regs[REG_CHIP_ID as usize] = CHIP_ID;
            regs[REG_CALIB as usize..REG_CALIB as usize + 24].copy_from_slice(&CALIB);
            regs[REG_DATA as usize..REG_DATA as usize + 6].copy_from_slice(&DATA);
            Self {
                regs,
                writes: Vec::new(),
                stuck_measuring: false,
            }
        }
    }

    impl RegisterBus for FakeBus {
        fn write_register(&mut self, register: u8, value: u8) -> io::Result<()> {
            self.writes.push((register, value));
            if register == REG_CTRL_MEAS && self.stuck_measuring {
                self.regs[REG_STATUS as usize] = STATUS_MEASURING;
            }
            Ok(())
        }

        fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> io::Result<()> {
            let start = start as usize;
            buf.copy_from_slice(&self.regs[start..start + buf.len()]);
            Ok(())
        }
    }

    /// Bus whose every transfer fails, like a detached device.
    struct DeadBus;

    impl RegisterBus for DeadBus {
        fn write_register(&mut self, _: u8, _: u8) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "nack"))
        }

        fn read_registers(&mut self, _: u8, _: &mut [u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "nack"))
        }
    }

    // -----------------------------------------------------------------------
    // Compensation
    // -----------------------------------------------------------------------

    #[test]
    fn test_calibration_decode() {
        let c = Calibration::from_bytes(&CALIB);
        assert_eq!(c.t1, 27504);
        assert_eq!(c.t2, 26435);
        assert_eq!(c.t3, -1000);
        assert_eq!(c.p1, 36477);
        assert_eq!(c.p2, -10685);
        assert_eq!(c.p6, -7);
        assert_eq!(c.p9, 6000);
    }

    #[test]
    fn test_datasheet_temperature() {
        let c = Calibration::from_bytes(&CALIB);
        let (celsius, t_fine) = c.compensate_temperature(519888);
        assert!((celsius - 25.08).abs() < 0.01, "got {celsius}");
        assert!((t_fine - 128422.287).abs() < 0.01);
    }

    #[test]
    fn test_datasheet_pressure() {
        let c = Calibration::from_bytes(&CALIB);
        let (_, t_fine) = c.compensate_temperature(519888);
        let pa = c.compensate_pressure(415148, t_fine).unwrap();
        assert!((pa - 100653.27).abs() < 0.01, "got {pa}");
    }

    #[test]
    fn test_zero_p1_has_no_pressure() {
        let mut c = Calibration::from_bytes(&CALIB);
        c.p1 = 0;
        assert!(c.compensate_pressure(415148, 128422.0).is_none());
    }

    #[test]
    fn test_altitude_at_sea_level_is_zero() {
        assert!(altitude_from_pressure(SEA_LEVEL_PA).abs() < 1e-9);
        assert!(altitude_from_pressure(90_000.0) > 900.0);
    }

    #[test]
    fn test_pa_to_mmhg() {
        assert!((pa_to_mmhg(SEA_LEVEL_PA) - 760.0).abs() < 0.01);
    }

    #[test]
    fn test_standard_ctrl_meas() {
        // osrs_t x1, osrs_p x4, forced.
        assert_eq!(Accuracy::Standard.ctrl_meas(), 0b001_011_01);
        assert!(Accuracy::Standard.measurement_time() < Duration::from_millis(20));
    }

    // -----------------------------------------------------------------------
    // Driver
    // -----------------------------------------------------------------------

    #[test]
    fn test_init_resets_and_loads_calibration() {
        let sensor = Bmp280::new(FakeBus::bmp280(), "bmp280").unwrap();
        assert_eq!(sensor.calibration().t1, 27504);
        assert!(sensor.bus.writes.contains(&(REG_RESET, RESET_COMMAND)));
        assert!(sensor.bus.writes.contains(&(REG_CONFIG, 0x00)));
    }

    #[test]
    fn test_wrong_chip_id_rejected() {
        let mut bus = FakeBus::bmp280();
        bus.regs[REG_CHIP_ID as usize] = 0x60;
        match Bmp280::new(bus, "bmp280") {
            Err(SensorError::InvalidChipId { found: 0x60, .. }) => {}
            other => panic!("expected chip id error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_reads_compensated_values() {
        let mut sensor = Bmp280::new(FakeBus::bmp280(), "bmp280").unwrap();
        let t = sensor.read_temperature().unwrap();
        let p = sensor.read_pressure().unwrap();
        let a = sensor.read_altitude().unwrap();
        assert!((t - 25.08).abs() < 0.01);
        assert!((p - 754.96).abs() < 0.01, "got {p}");
        assert!((a - 56.08).abs() < 0.05, "got {a}");
    }

    #[test]
    fn test_each_read_triggers_forced_measurement() {
        let mut sensor = Bmp280::new(FakeBus::bmp280(), "bmp280").unwrap();
        sensor.read_temperature().unwrap();
        sensor.read_pressure().unwrap();
        let forced = sensor
            .bus
            .writes
            .iter()
            .filter(|(reg, _)| *reg == REG_CTRL_MEAS)
            .count();
        assert_eq!(forced, 2);
    }

    #[test]
    fn test_accuracy_preset_sets_oversampling() {
        let mut sensor =
            Bmp280::with_accuracy(FakeBus::bmp280(), "bmp280", Accuracy::UltraHighResolution)
                .unwrap();
        assert_eq!(sensor.accuracy(), Accuracy::UltraHighResolution);
        sensor.read_pressure().unwrap();
        // osrs_t x2, osrs_p x16, forced.
        assert!(sensor.bus.writes.contains(&(REG_CTRL_MEAS, 0b010_101_01)));

        assert_eq!(Accuracy::UltraLowPower.ctrl_meas(), 0b001_001_01);
        assert!(
            Accuracy::UltraLowPower.measurement_time()
                < Accuracy::UltraHighResolution.measurement_time()
        );
    }

    #[test]
    fn test_stuck_conversion_times_out() {
        let mut sensor = Bmp280::new(FakeBus::bmp280(), "bmp280").unwrap();
        sensor.bus.stuck_measuring = true;
        match sensor.read_temperature() {
            Err(SensorError::Timeout { attempts }) => assert_eq!(attempts, MAX_STATUS_POLLS),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_skipped_pressure_is_invalid() {
        let mut bus = FakeBus::bmp280();
        bus.regs[REG_DATA as usize..REG_DATA as usize + 3].copy_from_slice(&[0x80, 0x00, 0x00]);
        let mut sensor = Bmp280::new(bus, "bmp280").unwrap();
        assert!(sensor.read_temperature().is_ok());
        assert!(matches!(
            sensor.read_pressure(),
            Err(SensorError::InvalidData(_))
        ));
    }

    #[test]
    fn test_dead_bus_is_io_error() {
        assert!(matches!(
            Bmp280::new(DeadBus, "bmp280"),
            Err(SensorError::Io(_))
        ));
    }
}
