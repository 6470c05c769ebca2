//! Superframe and carrier geometry
//!
//! A superframe is a fixed time window containing one or more frames; each
//! frame contributes a set of identical carriers. Carrier capacity is the
//! number of symbols a carrier fits in one superframe. The geometry is
//! immutable after configuration load; carriers are re-derived only at a
//! reconfiguration epoch.

use std::time::Duration;

use rtnsim_common::config::{CarrierTrafficType, SuperframeConfig};
use rtnsim_common::{CarrierId, Error, FrameId};

/// One return-link carrier of the superframe.
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    id: CarrierId,
    frame_id: FrameId,
    symbol_rate_baud: f64,
    guard_time_symbols: u32,
    traffic: CarrierTrafficType,
    capacity_symbols: f64,
}

impl Carrier {
    /// Returns the carrier identifier.
    pub fn id(&self) -> CarrierId {
        self.id
    }

    /// Returns the frame this carrier belongs to.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Symbol rate in baud.
    pub fn symbol_rate_baud(&self) -> f64 {
        self.symbol_rate_baud
    }

    /// Guard time between consecutive bursts, in symbols.
    pub fn guard_time_symbols(&self) -> u32 {
        self.guard_time_symbols
    }

    /// Traffic type served by this carrier.
    pub fn traffic(&self) -> CarrierTrafficType {
        self.traffic
    }

    /// Symbols this carrier fits in one superframe.
    pub fn capacity_symbols(&self) -> f64 {
        self.capacity_symbols
    }

    /// True when the carrier serves demand-assigned traffic.
    pub fn is_dama(&self) -> bool {
        self.traffic == CarrierTrafficType::Dama
    }
}

/// The immutable carrier arena of one superframe.
///
/// Carriers are stored in id order and carrier ids are global: frames are
/// numbered in configuration order and their carriers laid out
/// consecutively.
#[derive(Debug, Clone)]
pub struct SuperframeConf {
    duration: Duration,
    carriers: Vec<Carrier>,
}

impl SuperframeConf {
    /// Derives the carrier arena from configuration. Geometry errors are
    /// fatal at startup.
    pub fn from_config(config: &SuperframeConfig) -> Result<Self, Error> {
        if config.duration_ms == 0 {
            return Err(Error::Config("superframe duration is zero".into()));
        }
        if config.frames.is_empty() {
            return Err(Error::Config("superframe has no frames".into()));
        }

        let duration = Duration::from_millis(config.duration_ms);
        let mut carriers = Vec::new();

        for frame in &config.frames {
            if frame.carrier_count == 0 {
                return Err(Error::Config(format!("{} has no carriers", frame.frame_id)));
            }
            if frame.symbol_rate_baud <= 0.0 {
                return Err(Error::Config(format!(
                    "{} has a non-positive symbol rate",
                    frame.frame_id
                )));
            }
            for _ in 0..frame.carrier_count {
                let id = CarrierId(carriers.len() as u16);
                carriers.push(Carrier {
                    id,
                    frame_id: frame.frame_id,
                    symbol_rate_baud: frame.symbol_rate_baud,
                    guard_time_symbols: frame.guard_time_symbols,
                    traffic: frame.traffic,
                    capacity_symbols: frame.symbol_rate_baud * duration.as_secs_f64(),
                });
            }
        }

        if !carriers.iter().any(Carrier::is_dama) {
            return Err(Error::Config("superframe has no DAMA carriers".into()));
        }

        Ok(Self { duration, carriers })
    }

    /// Superframe duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// All carriers in id order.
    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    /// Looks up a carrier by id.
    pub fn carrier(&self, id: CarrierId) -> Option<&Carrier> {
        self.carriers.get(id.0 as usize)
    }

    /// Carriers serving DAMA traffic.
    pub fn dama_carriers(&self) -> impl Iterator<Item = &Carrier> {
        self.carriers.iter().filter(|c| c.is_dama())
    }

    /// Carriers serving random-access traffic.
    pub fn random_access_carriers(&self) -> impl Iterator<Item = &Carrier> {
        self.carriers.iter().filter(|c| !c.is_dama())
    }
}
