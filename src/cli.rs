//! Clap/serde surface for the IVH options, for embedding into a driver's
//! argument parser or a run configuration file.

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::sketch::IvhOpts;

/// Interval-hash parameters.
#[derive(Parser, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[clap(next_help_heading = "Interval hash")]
#[serde(default, deny_unknown_fields)]
pub struct IvhParams {
    /// Pattern window radius in minimizers; 0 disables augmentation.
    #[clap(long, default_value_t = 4, value_name = "wing")]
    pub wing: u32,

    /// Longest gap that can join a pattern window, in bases.
    #[clap(long, default_value_t = 1000, value_name = "len")]
    pub max_ivh_span: u32,

    /// Width of the local-frequency window, in bases; 0 disables the
    /// filter.
    #[clap(long, default_value_t = 1000, value_name = "len")]
    pub rep_flt_span: u32,

    /// Minimizers tolerated within the local-frequency window.
    #[clap(long, default_value_t = 8, value_name = "n")]
    pub max_rep: u32,

    /// Occurrence cap for chaining-side seed filtering.
    #[clap(long, default_value_t = 300, hide_short_help = true)]
    pub mid_occ: u32,

    /// Occurrence cap for match collection.
    #[clap(long, default_value_t = 300, hide_short_help = true)]
    pub max_occ: u32,

    /// Sliding-window width for the seed tie-rescue.
    #[clap(long, default_value_t = 16, value_name = "w")]
    pub tie_rescue_w: u32,

    /// Minimal chain length for hit-count accumulation.
    #[clap(long, default_value_t = 3, hide_short_help = true)]
    pub min_cnt: i32,

    /// Overhang tolerance for dovetail classification, in bases.
    #[clap(long, default_value_t = 1000, value_name = "len")]
    pub max_ovh: i32,

    /// Minimal overlap span for half-dovetail retention, in bases.
    #[clap(long, default_value_t = 2000, value_name = "len")]
    pub min_intl: i32,

    /// Keep regions scoring at least this fraction of the per-target best.
    #[clap(long, default_value_t = 0.8, value_name = "ratio")]
    pub pri_ratio: f32,

    /// Regions kept per target before the ratio cut.
    #[clap(long, default_value_t = 64, value_name = "n")]
    pub best_n: i32,

    /// Keep pattern hashes near sequence boundaries.
    #[clap(long)]
    pub no_skip_bnd: bool,
}

impl Default for IvhParams {
    fn default() -> Self {
        let o = IvhOpts::default();
        IvhParams {
            wing: o.wing,
            max_ivh_span: o.max_ivh_span,
            rep_flt_span: o.rep_flt_span,
            max_rep: o.max_rep,
            mid_occ: o.mid_occ,
            max_occ: o.max_occ,
            tie_rescue_w: o.tie_rescue_w,
            min_cnt: o.min_cnt,
            max_ovh: o.max_ovh,
            min_intl: o.min_intl,
            pri_ratio: o.pri_ratio,
            best_n: o.best_n,
            no_skip_bnd: !o.skip_bnd,
        }
    }
}

impl From<IvhParams> for IvhOpts {
    fn from(p: IvhParams) -> Self {
        IvhOpts {
            wing: p.wing,
            max_ivh_span: p.max_ivh_span,
            rep_flt_span: p.rep_flt_span,
            max_rep: p.max_rep,
            mid_occ: p.mid_occ,
            max_occ: p.max_occ,
            tie_rescue_w: p.tie_rescue_w,
            min_cnt: p.min_cnt,
            max_ovh: p.max_ovh,
            min_intl: p.min_intl,
            pri_ratio: p.pri_ratio,
            best_n: p.best_n,
            skip_bnd: !p.no_skip_bnd,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_round_trip_into_opts() {
        let o: IvhOpts = IvhParams::default().into();
        assert_eq!(o, IvhOpts::default());
    }
}
