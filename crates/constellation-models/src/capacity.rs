//! Ku/Ka-band Link Budget and Channel Capacity
//!
//! Downlink budget from satellite to a 2 m user terminal at the edge of the
//! coverage footprint, converted to a data rate and then to a number of
//! simultaneous voice-equivalent channels using an MF-TDMA frame model.

use crate::geometry::{path_distance_km, satellite_count};
use crate::{db, Result, SatelliteDesign};
use serde::{Deserialize, Serialize};

/// Link parameters
const CARRIERS: f64 = 2000.0;
const BOLTZMANN_DBW: f64 = -228.6;      // dBW/K/Hz
const TX_EFFICIENCY: f64 = 0.6;
const TX_LINE_LOSS_DB: f64 = 5.0;
const ATMOSPHERIC_LOSS_DB: f64 = 1.5;
const RX_DIAMETER_M: f64 = 2.0;         // User terminal
const RX_EFFICIENCY: f64 = 0.55;
const RX_LINE_LOSS_DB: f64 = 2.0;
const SYSTEM_NOISE_DBK: f64 = 27.3;     // 537 K
const REQUIRED_EBN0_DB: f64 = 12.3;     // QPSK, BER 1e-6 with margin

/// Antenna gain constant for gain = 20.4 + 20log(f GHz) + 20log(D m) + 10log(eta)
const GAIN_CONSTANT_DB: f64 = 20.4;
/// Free space loss constant for loss = 92.45 + 20log(d km) + 20log(f GHz)
const SPACE_LOSS_CONSTANT_DB: f64 = 92.45;

/// TDMA frame parameters
const FRAME_BITS: f64 = 928.0;          // Z: bits per channel burst
const CHANNEL_REUSE: f64 = 5.0;         // K: frequency reuse clusters
const SAT_BANDWIDTH: f64 = 2000.0;      // Bsat (MHz)
const CARRIER_BANDWIDTH: f64 = 250.0;   // BT (MHz)
const GUARD_BANDWIDTH: f64 = 0.0;       // Bg (MHz)
const FRAME_TIME: f64 = 90.0;           // Tf (ms)
const OVERHEAD_BITS: f64 = 864.0;       // F: preamble and reference bursts
const CHANNELS_PER_FRAME: f64 = 432.0;  // nc
const GUARD_TIME: f64 = 0.36;           // Tg (ms)

/// Share of footprint channels in use at peak load
const ACTIVE_FRACTION: f64 = 0.1;

/// Detailed link budget breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkBudgetBreakdown {
    pub tx_gain_db: f64,
    pub eirp_dbw: f64,
    pub eirp_per_carrier_dbw: f64,
    pub path_distance_km: f64,
    pub space_loss_db: f64,
    pub rx_gain_db: f64,
    pub g_over_t_db: f64,
    pub total_loss_db: f64,
    pub data_rate_mbps: f64,
}

/// Full downlink budget at the footprint edge
pub fn detailed_budget(
    design: &SatelliteDesign,
    elevation_deg: f64,
    altitude_km: f64,
) -> Result<LinkBudgetBreakdown> {
    let f = design.frequency_ghz;

    let tx_gain_db = GAIN_CONSTANT_DB + 2.0 * db(f) + 2.0 * db(design.diameter_m) + db(TX_EFFICIENCY);
    let eirp_dbw = db(design.power_w) + tx_gain_db - TX_LINE_LOSS_DB;
    let eirp_per_carrier_dbw = eirp_dbw - db(CARRIERS);

    let path_distance_km = path_distance_km(elevation_deg, altitude_km)?;
    let space_loss_db = SPACE_LOSS_CONSTANT_DB + 2.0 * db(path_distance_km) + 2.0 * db(f);

    let rx_gain_db = GAIN_CONSTANT_DB + 2.0 * db(f) + 2.0 * db(RX_DIAMETER_M) + db(RX_EFFICIENCY);
    let g_over_t_db = rx_gain_db - SYSTEM_NOISE_DBK;
    let total_loss_db = space_loss_db + ATMOSPHERIC_LOSS_DB + RX_LINE_LOSS_DB;

    let margin_db =
        eirp_per_carrier_dbw + g_over_t_db - total_loss_db - BOLTZMANN_DBW - REQUIRED_EBN0_DB;
    let data_rate_mbps = 10f64.powf(margin_db / 10.0) / 1e6;

    Ok(LinkBudgetBreakdown {
        tx_gain_db,
        eirp_dbw,
        eirp_per_carrier_dbw,
        path_distance_km,
        space_loss_db,
        rx_gain_db,
        g_over_t_db,
        total_loss_db,
        data_rate_mbps,
    })
}

/// Supportable data rate per carrier (Mbps)
pub fn data_rate_mbps(design: &SatelliteDesign, elevation_deg: f64, altitude_km: f64) -> Result<f64> {
    Ok(detailed_budget(design, elevation_deg, altitude_km)?.data_rate_mbps)
}

/// Channels a single satellite supports at the given data rate.
/// Negative when the rate cannot even carry the frame overhead.
pub fn channels_per_satellite(rate_mbps: f64) -> f64 {
    (FRAME_BITS / (2.0 * CHANNEL_REUSE))
        * (SAT_BANDWIDTH / (CARRIER_BANDWIDTH + GUARD_BANDWIDTH))
        * ((rate_mbps * FRAME_TIME - OVERHEAD_BITS) / (CHANNELS_PER_FRAME + rate_mbps * GUARD_TIME))
}

/// Constellation capacity in channels for `n` satellites, floored at zero
pub fn capacity(design: &SatelliteDesign, elevation_deg: f64, altitude_km: f64, n: u32) -> Result<f64> {
    let rate = data_rate_mbps(design, elevation_deg, altitude_km)?;
    let channels = channels_per_satellite(rate) * f64::from(n) * ACTIVE_FRACTION;
    Ok((channels * design.isl.utilisation()).max(0.0))
}

/// Satellite count and capacity for a configuration in one pass
pub fn size_configuration(
    design: &SatelliteDesign,
    elevation_deg: f64,
    altitude_km: f64,
) -> Result<(u32, f64)> {
    let n = satellite_count(elevation_deg, altitude_km)?;
    Ok((n, capacity(design, elevation_deg, altitude_km, n)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IslTopology;

    fn design(isl: IslTopology) -> SatelliteDesign {
        SatelliteDesign::new(2.0, 800.0, 15.0, isl).unwrap()
    }

    #[test]
    fn test_data_rate() {
        let rate = data_rate_mbps(&design(IslTopology::Mesh), 15.0, 1000.0).unwrap();
        assert!((rate - 628.73).abs() < 0.01, "rate = {}", rate);
    }

    #[test]
    fn test_rate_independent_of_isl() {
        let a = data_rate_mbps(&design(IslTopology::None), 30.0, 800.0).unwrap();
        let b = data_rate_mbps(&design(IslTopology::Mesh), 30.0, 800.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_capacity_scales_with_utilisation() {
        let none = capacity(&design(IslTopology::None), 15.0, 1000.0, 96).unwrap();
        let mesh = capacity(&design(IslTopology::Mesh), 15.0, 1000.0, 96).unwrap();
        assert!(none > 0.0);
        assert!((mesh / none - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_capacity_floored_at_zero() {
        // Tiny antenna at low power cannot close the frame overhead
        let weak = SatelliteDesign::new(0.1, 1.0, 15.0, IslTopology::Mesh).unwrap();
        assert_eq!(capacity(&weak, 15.0, 1600.0, 50).unwrap(), 0.0);
    }

    #[test]
    fn test_breakdown_consistent() {
        let b = detailed_budget(&design(IslTopology::Ring), 45.0, 600.0).unwrap();
        assert!(b.eirp_per_carrier_dbw < b.eirp_dbw);
        assert!(b.path_distance_km > 600.0);
        assert!(b.data_rate_mbps > 0.0);
    }

    #[test]
    fn test_size_configuration() {
        let (n, cap) = size_configuration(&design(IslTopology::Mesh), 15.0, 1000.0).unwrap();
        assert_eq!(n, 96);
        assert!(cap > 0.0);
    }
}
