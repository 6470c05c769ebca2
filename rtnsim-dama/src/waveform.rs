//! Burst waveform table and link-quality driven selection
//!
//! Each return-link burst is transmitted with one waveform out of a static
//! table (MODCOD + burst length combinations). The table is loaded once at
//! configuration time; selection picks the most spectrally efficient
//! waveform whose required C/N0 is at or below the terminal's current
//! estimate.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use rtnsim_common::config::WaveformTableConfig;
use rtnsim_common::{Error, WaveformId};

/// No waveform in the table closes the link at the given C/N0.
///
/// Per-terminal and recoverable: the caller either skips the terminal for
/// the cycle (its request persists) or falls back to the most robust
/// waveform, depending on policy.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("no feasible waveform for estimated C/N0 {cno_dbhz:.1} dBHz")]
pub struct NoFeasibleWaveform {
    /// The estimate that no waveform could serve.
    pub cno_dbhz: f64,
}

/// One burst waveform: MODCOD, payload and burst geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    id: WaveformId,
    modulated_bits: u8,
    coding_rate: f64,
    payload_bytes: u32,
    burst_length_symbols: u32,
    required_cno_dbhz: f64,
}

impl Waveform {
    /// Returns the waveform identifier.
    pub fn id(&self) -> WaveformId {
        self.id
    }

    /// Payload carried by one burst, in bytes.
    pub fn payload_bytes(&self) -> u32 {
        self.payload_bytes
    }

    /// Payload carried by one burst, in bits.
    pub fn payload_bits(&self) -> u32 {
        self.payload_bytes * 8
    }

    /// Burst length in symbols, preamble included.
    pub fn burst_length_symbols(&self) -> u32 {
        self.burst_length_symbols
    }

    /// Minimum C/N0 in dBHz required to close the link.
    pub fn required_cno_dbhz(&self) -> f64 {
        self.required_cno_dbhz
    }

    /// Payload bits per transmitted symbol.
    pub fn spectral_efficiency(&self) -> f64 {
        f64::from(self.payload_bits()) / f64::from(self.burst_length_symbols)
    }

    /// Symbols consumed per payload byte.
    pub fn symbols_per_byte(&self) -> f64 {
        f64::from(self.burst_length_symbols) / f64::from(self.payload_bytes)
    }

    /// Burst duration at the given carrier symbol rate.
    pub fn burst_duration(&self, symbol_rate_baud: f64) -> Duration {
        Duration::from_secs_f64(f64::from(self.burst_length_symbols) / symbol_rate_baud)
    }

    /// Burst payload throughput at the given carrier symbol rate.
    pub fn throughput_bps(&self, symbol_rate_baud: f64) -> f64 {
        f64::from(self.payload_bits()) * symbol_rate_baud / f64::from(self.burst_length_symbols)
    }
}

/// The waveform table with its selection policy.
#[derive(Debug, Clone)]
pub struct WaveformConf {
    waveforms: BTreeMap<WaveformId, Waveform>,
    acm_enabled: bool,
    default_id: WaveformId,
}

impl WaveformConf {
    /// Builds the table from configuration. Malformed tables are fatal at
    /// startup.
    pub fn from_config(config: &WaveformTableConfig) -> Result<Self, Error> {
        if config.waveforms.is_empty() {
            return Err(Error::Config("waveform table is empty".into()));
        }

        let mut waveforms = BTreeMap::new();
        for row in &config.waveforms {
            if row.payload_bytes == 0 || row.burst_length_symbols == 0 {
                return Err(Error::Config(format!(
                    "waveform {} has zero payload or burst length",
                    row.id
                )));
            }
            if row.modulated_bits == 0 || row.coding_rate <= 0.0 || row.coding_rate > 1.0 {
                return Err(Error::Config(format!(
                    "waveform {} has invalid MODCOD parameters",
                    row.id
                )));
            }
            let waveform = Waveform {
                id: row.id,
                modulated_bits: row.modulated_bits,
                coding_rate: row.coding_rate,
                payload_bytes: row.payload_bytes,
                burst_length_symbols: row.burst_length_symbols,
                required_cno_dbhz: row.required_cno_dbhz,
            };
            if waveforms.insert(row.id, waveform).is_some() {
                return Err(Error::Config(format!("duplicate waveform id {}", row.id)));
            }
        }

        if !waveforms.contains_key(&config.default_waveform) {
            return Err(Error::Config(format!(
                "default waveform {} is not in the table",
                config.default_waveform
            )));
        }

        Ok(Self {
            waveforms,
            acm_enabled: config.acm_enabled,
            default_id: config.default_waveform,
        })
    }

    /// Looks up a waveform by id.
    pub fn get(&self, id: WaveformId) -> Option<&Waveform> {
        self.waveforms.get(&id)
    }

    /// The waveform used when ACM is disabled or no estimate exists.
    pub fn default_waveform(&self) -> &Waveform {
        &self.waveforms[&self.default_id]
    }

    /// Selects the best waveform for the given C/N0 estimate.
    ///
    /// Deterministic: the most spectrally efficient waveform whose required
    /// C/N0 is at or below the estimate wins; ties go to the shortest burst,
    /// then the lowest id. With ACM disabled, or without an estimate, the
    /// default waveform is returned unconditionally.
    pub fn select_best(&self, cno_dbhz: Option<f64>) -> Result<&Waveform, NoFeasibleWaveform> {
        let cno = match (self.acm_enabled, cno_dbhz) {
            (false, _) | (true, None) => return Ok(self.default_waveform()),
            (true, Some(cno)) => cno,
        };

        self.waveforms
            .values()
            .filter(|wf| wf.required_cno_dbhz <= cno)
            .min_by(|a, b| {
                b.spectral_efficiency()
                    .total_cmp(&a.spectral_efficiency())
                    .then(a.burst_length_symbols.cmp(&b.burst_length_symbols))
                    .then(a.id.cmp(&b.id))
            })
            .ok_or(NoFeasibleWaveform { cno_dbhz: cno })
    }

    /// The most robust waveform in the table: lowest C/N0 requirement,
    /// ties broken toward the smallest payload.
    pub fn most_robust(&self) -> &Waveform {
        self.waveforms
            .values()
            .min_by(|a, b| {
                a.required_cno_dbhz
                    .total_cmp(&b.required_cno_dbhz)
                    .then(a.payload_bytes.cmp(&b.payload_bytes))
            })
            .expect("table is never empty after construction")
    }

    /// Iterates the table in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Waveform> {
        self.waveforms.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtnsim_common::config::WaveformConfig;

    fn table() -> WaveformTableConfig {
        WaveformTableConfig {
            acm_enabled: true,
            default_waveform: WaveformId(2),
            waveforms: vec![
                // robust QPSK 1/3
                WaveformConfig {
                    id: WaveformId(2),
                    modulated_bits: 2,
                    coding_rate: 1.0 / 3.0,
                    payload_bytes: 38,
                    burst_length_symbols: 536,
                    required_cno_dbhz: 58.0,
                },
                // QPSK 2/3
                WaveformConfig {
                    id: WaveformId(5),
                    modulated_bits: 2,
                    coding_rate: 2.0 / 3.0,
                    payload_bytes: 86,
                    burst_length_symbols: 536,
                    required_cno_dbhz: 62.0,
                },
                // 8PSK 3/4
                WaveformConfig {
                    id: WaveformId(12),
                    modulated_bits: 3,
                    coding_rate: 0.75,
                    payload_bytes: 147,
                    burst_length_symbols: 536,
                    required_cno_dbhz: 68.0,
                },
            ],
        }
    }

    #[test]
    fn test_rejects_empty_table() {
        let config = WaveformTableConfig {
            acm_enabled: true,
            default_waveform: WaveformId(0),
            waveforms: vec![],
        };
        assert!(WaveformConf::from_config(&config).is_err());
    }

    #[test]
    fn test_rejects_unknown_default() {
        let mut config = table();
        config.default_waveform = WaveformId(99);
        assert!(WaveformConf::from_config(&config).is_err());
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let mut config = table();
        let dup = config.waveforms[0].clone();
        config.waveforms.push(dup);
        assert!(WaveformConf::from_config(&config).is_err());
    }

    #[test]
    fn test_select_most_efficient_feasible() {
        let conf = WaveformConf::from_config(&table()).unwrap();
        // 65 dBHz qualifies wf2 and wf5; wf5 is more efficient
        let wf = conf.select_best(Some(65.0)).unwrap();
        assert_eq!(wf.id(), WaveformId(5));
        // 70 dBHz qualifies everything; 8PSK 3/4 wins
        let wf = conf.select_best(Some(70.0)).unwrap();
        assert_eq!(wf.id(), WaveformId(12));
    }

    #[test]
    fn test_select_no_feasible_waveform() {
        let conf = WaveformConf::from_config(&table()).unwrap();
        let err = conf.select_best(Some(50.0)).unwrap_err();
        assert_eq!(err, NoFeasibleWaveform { cno_dbhz: 50.0 });
    }

    #[test]
    fn test_select_without_estimate_uses_default() {
        let conf = WaveformConf::from_config(&table()).unwrap();
        assert_eq!(conf.select_best(None).unwrap().id(), WaveformId(2));
    }

    #[test]
    fn test_acm_disabled_uses_default() {
        let mut config = table();
        config.acm_enabled = false;
        let conf = WaveformConf::from_config(&config).unwrap();
        // even an excellent link gets the default waveform
        assert_eq!(conf.select_best(Some(90.0)).unwrap().id(), WaveformId(2));
    }

    #[test]
    fn test_most_robust() {
        let conf = WaveformConf::from_config(&table()).unwrap();
        assert_eq!(conf.most_robust().id(), WaveformId(2));
    }

    #[test]
    fn test_waveform_derived_quantities() {
        let conf = WaveformConf::from_config(&table()).unwrap();
        let wf = conf.get(WaveformId(5)).unwrap();
        assert_eq!(wf.payload_bits(), 688);
        assert!((wf.spectral_efficiency() - 688.0 / 536.0).abs() < 1e-9);
        assert!((wf.symbols_per_byte() - 536.0 / 86.0).abs() < 1e-9);
        let dur = wf.burst_duration(250_000.0);
        assert!((dur.as_secs_f64() - 536.0 / 250_000.0).abs() < 1e-9);
    }
}
