//! Configuration structures for the NCC beam scheduler
//!
//! The whole configuration surface of the scheduler lives here: superframe
//! geometry, the waveform table, DAMA service parameters and the
//! random-access channel setup. The configuration is loaded once at startup
//! from YAML; malformed tables are fatal at that point and never recoverable
//! at runtime.

use serde::{Deserialize, Serialize};

use crate::types::{FrameId, TerminalId, WaveformId};

/// Traffic type served by a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierTrafficType {
    /// Demand-assigned traffic, scheduled per terminal by the allocator.
    Dama,
    /// Contention-based traffic, published as windows instead of grants.
    RandomAccess,
}

/// Static description of one frame of the superframe structure.
///
/// All carriers of a frame share the same symbol rate and guard time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Frame identifier within the superframe.
    pub frame_id: FrameId,
    /// Number of frequency carriers in this frame.
    pub carrier_count: u16,
    /// Symbol rate of each carrier in baud.
    pub symbol_rate_baud: f64,
    /// Guard time between consecutive bursts, in symbols.
    #[serde(default)]
    pub guard_time_symbols: u32,
    /// Traffic type served by the carriers of this frame.
    pub traffic: CarrierTrafficType,
}

/// Superframe geometry: duration plus the frames it is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperframeConfig {
    /// Superframe (and allocation cycle) duration in milliseconds.
    pub duration_ms: u64,
    /// Frames making up the superframe.
    pub frames: Vec<FrameConfig>,
}

/// One row of the burst waveform table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformConfig {
    /// Waveform identifier.
    pub id: WaveformId,
    /// Bits per modulated symbol (2 = QPSK, 3 = 8PSK, ...).
    pub modulated_bits: u8,
    /// Code rate of the burst FEC.
    pub coding_rate: f64,
    /// Payload carried by one burst, in bytes.
    pub payload_bytes: u32,
    /// Burst length in symbols, preamble included.
    pub burst_length_symbols: u32,
    /// Minimum C/N0 in dBHz required to close the link with this waveform.
    pub required_cno_dbhz: f64,
}

/// The waveform table plus its selection policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformTableConfig {
    /// Adaptive coding and modulation: when disabled the default waveform
    /// is used for every terminal regardless of link quality.
    #[serde(default = "default_true")]
    pub acm_enabled: bool,
    /// Waveform used when ACM is disabled or no C/N0 estimate exists.
    pub default_waveform: WaveformId,
    /// The waveform rows.
    pub waveforms: Vec<WaveformConfig>,
}

/// Policy used to split dynamic capacity between competing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairSharePolicy {
    /// Greedy max-min water-filling: repeatedly grant the smallest unfilled
    /// request up to the per-round fair share.
    #[default]
    MaxMin,
    /// Grants proportional to the requested amount.
    Proportional,
}

/// Method used to reduce C/N0 samples to a single estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CnoEstimationMode {
    /// Most recent sample within the window.
    #[default]
    Last,
    /// Minimum sample within the window (conservative).
    Minimum,
    /// Mean of the samples within the window.
    Average,
}

/// DAMA allocation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamaConfig {
    /// Upper bound on the dynamic share of a carrier, as a fraction of its
    /// symbol capacity. CRA is exempt; it is a contractual guarantee.
    #[serde(default = "default_target_load")]
    pub target_load: f64,
    /// Free capacity allocation enable status.
    #[serde(default)]
    pub fca_enabled: bool,
    /// Policy for splitting dynamic capacity.
    #[serde(default)]
    pub fair_share: FairSharePolicy,
    /// When a terminal has no feasible waveform, fall back to the most
    /// robust one instead of skipping the terminal for the cycle.
    #[serde(default)]
    pub fallback_most_robust: bool,
    /// Horizon over which an unrefreshed RBDC request decays linearly to
    /// zero, in milliseconds.
    #[serde(default = "default_rbdc_decay_ms")]
    pub rbdc_decay_ms: u64,
    /// Re-homing epoch length in superframes; terminals may only be moved
    /// between carriers at epoch boundaries. Zero disables re-homing.
    #[serde(default = "default_rehoming_epoch")]
    pub rehoming_epoch_superframes: u32,
    /// C/N0 estimation mode.
    #[serde(default)]
    pub cno_mode: CnoEstimationMode,
    /// C/N0 sample window in milliseconds.
    #[serde(default = "default_cno_window_ms")]
    pub cno_window_ms: u64,
}

impl Default for DamaConfig {
    fn default() -> Self {
        Self {
            target_load: default_target_load(),
            fca_enabled: false,
            fair_share: FairSharePolicy::default(),
            fallback_most_robust: false,
            rbdc_decay_ms: default_rbdc_decay_ms(),
            rehoming_epoch_superframes: default_rehoming_epoch(),
            cno_mode: CnoEstimationMode::default(),
            cno_window_ms: default_cno_window_ms(),
        }
    }
}

/// Contention scheme applied on random-access carriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomAccessScheme {
    /// Plain slotted ALOHA, one transmission per attempt.
    SlottedAloha,
    /// Contention Resolution Diversity Slotted ALOHA with replicas.
    Crdsa,
}

/// CRDSA back-off parameters published to terminals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrdsaConfig {
    /// Number of burst replicas per unique payload.
    #[serde(default = "default_crdsa_replicas")]
    pub replicas: u8,
    /// Back-off time applied after a failed attempt, in milliseconds.
    #[serde(default = "default_crdsa_backoff_ms")]
    pub backoff_time_ms: u32,
    /// Probability of backing off before an attempt.
    #[serde(default)]
    pub backoff_probability: f64,
}

impl Default for CrdsaConfig {
    fn default() -> Self {
        Self {
            replicas: default_crdsa_replicas(),
            backoff_time_ms: default_crdsa_backoff_ms(),
            backoff_probability: 0.0,
        }
    }
}

/// Random-access channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomAccessConfig {
    /// Contention scheme in force on all random-access carriers.
    pub scheme: RandomAccessScheme,
    /// CRDSA parameters, meaningful when the scheme is CRDSA.
    #[serde(default)]
    pub crdsa: CrdsaConfig,
}

/// Per-terminal DAMA service parameters.
///
/// These are the provisioned, contractual values; the dynamic request state
/// lives in the terminal's allocation context at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalServiceConfig {
    /// Terminal identifier.
    pub id: TerminalId,
    /// Constant rate assignment in kbps, granted in full every superframe.
    #[serde(default)]
    pub cra_kbps: u32,
    /// Minimum RBDC rate in kbps guaranteed while RBDC is active.
    #[serde(default)]
    pub min_rbdc_kbps: u32,
    /// Maximum total CRA+RBDC rate in kbps.
    pub max_rbdc_kbps: u32,
    /// Cap on the accumulated VBDC backlog in bytes.
    #[serde(default = "default_max_vbdc_backlog")]
    pub max_vbdc_backlog_bytes: u64,
    /// Whether the terminal participates in free capacity allocation.
    #[serde(default)]
    pub fca_eligible: bool,
}

/// Complete NCC beam scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NccConfig {
    /// Beam identifier carried in every TBTP message.
    pub beam_id: u32,
    /// Superframe geometry.
    pub superframe: SuperframeConfig,
    /// Burst waveform table.
    pub waveform_table: WaveformTableConfig,
    /// DAMA allocation parameters.
    #[serde(default)]
    pub dama: DamaConfig,
    /// Random-access channel configuration.
    pub random_access: RandomAccessConfig,
    /// Terminals provisioned at startup; more may log on at runtime.
    #[serde(default)]
    pub terminals: Vec<TerminalServiceConfig>,
    /// Margin before the next superframe start by which the TBTP must have
    /// been handed to transmission, in milliseconds.
    #[serde(default = "default_publish_guard_ms")]
    pub publish_guard_ms: u64,
}

impl NccConfig {
    /// Returns the set of carrier ids, numbered across frames in frame
    /// order. Carrier ids are global to the superframe.
    pub fn carrier_count(&self) -> u16 {
        self.superframe
            .frames
            .iter()
            .map(|f| f.carrier_count)
            .sum()
    }

    /// Looks up the service parameters of a provisioned terminal.
    pub fn terminal_service(&self, id: TerminalId) -> Option<&TerminalServiceConfig> {
        self.terminals.iter().find(|t| t.id == id)
    }
}

fn default_true() -> bool {
    true
}

fn default_target_load() -> f64 {
    1.0
}

fn default_rbdc_decay_ms() -> u64 {
    1000
}

fn default_rehoming_epoch() -> u32 {
    10
}

fn default_cno_window_ms() -> u64 {
    1000
}

fn default_crdsa_replicas() -> u8 {
    3
}

fn default_crdsa_backoff_ms() -> u32 {
    250
}

fn default_max_vbdc_backlog() -> u64 {
    1024 * 1024
}

fn default_publish_guard_ms() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
beam_id: 1
superframe:
  duration_ms: 100
  frames:
    - frame_id: 0
      carrier_count: 2
      symbol_rate_baud: 250000.0
      traffic: dama
    - frame_id: 1
      carrier_count: 1
      symbol_rate_baud: 250000.0
      traffic: random_access
waveform_table:
  default_waveform: 3
  waveforms:
    - id: 3
      modulated_bits: 2
      coding_rate: 0.5
      payload_bytes: 64
      burst_length_symbols: 536
      required_cno_dbhz: 60.5
random_access:
  scheme: crdsa
terminals:
  - id: 1
    cra_kbps: 64
    max_rbdc_kbps: 512
"#
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: NccConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.beam_id, 1);
        assert_eq!(config.superframe.frames.len(), 2);
        assert_eq!(config.carrier_count(), 3);
        assert!(config.waveform_table.acm_enabled);
        assert_eq!(config.dama.target_load, 1.0);
        assert_eq!(config.dama.fair_share, FairSharePolicy::MaxMin);
        assert_eq!(config.random_access.scheme, RandomAccessScheme::Crdsa);
        assert_eq!(config.random_access.crdsa.replicas, 3);
    }

    #[test]
    fn test_terminal_service_lookup() {
        let config: NccConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        let ut = config.terminal_service(TerminalId(1)).unwrap();
        assert_eq!(ut.cra_kbps, 64);
        assert_eq!(ut.max_rbdc_kbps, 512);
        assert!(!ut.fca_eligible);
        assert!(config.terminal_service(TerminalId(9)).is_none());
    }

    #[test]
    fn test_dama_defaults() {
        let dama = DamaConfig::default();
        assert_eq!(dama.target_load, 1.0);
        assert!(!dama.fca_enabled);
        assert!(!dama.fallback_most_robust);
        assert_eq!(dama.rbdc_decay_ms, 1000);
        assert_eq!(dama.cno_mode, CnoEstimationMode::Last);
    }

    #[test]
    fn test_config_roundtrip() {
        let config: NccConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let reparsed: NccConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, reparsed);
    }
}
