//! Field value prediction
//!
//! A raw integer from the codec layer is combined with a predictor-specific
//! baseline to reconstruct the logical field value. Baselines come from the
//! decode history, header constants, or fields decoded earlier in the same
//! frame.

use crate::frame::History;
use crate::types::{DecodeError, FrameType, Result};
use serde::Serialize;

/// Predictor kinds declared by the `Field <T> predictor` header lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Predictor {
    /// Baseline 0 (id 0)
    Zero,
    /// The previous main frame's value for this field (id 1)
    Previous,
    /// Linear extrapolation from the two previous main frames (id 2)
    StraightLine,
    /// Mean of the two previous main frames' values (id 3)
    Average2,
    /// The `minthrottle` header constant (id 4)
    MinThrottle,
    /// The value of `motor[0]` decoded earlier in the same frame (id 5)
    Motor0,
    /// The previous value plus one per logged loop iteration (id 6)
    Increment,
    /// The first GPS home coordinate (id 7)
    HomeCoord0,
    /// The second GPS home coordinate (id 7 on the remapped field, id 12)
    HomeCoord1,
    /// The constant 1500 (id 8)
    Const1500,
    /// The `vbatref` header constant (id 9)
    VbatRef,
    /// The `time` value of the last accepted main frame (id 10)
    LastMainFrameTime,
    /// The minimum motor output from the `motorOutput` header (id 11)
    MinMotor,
}

impl Predictor {
    /// Map a header predictor id to a predictor kind
    ///
    /// The home-coordinate predictor shares one id between latitude and
    /// longitude; firmware distinguishes them by field name, so the name
    /// takes part in the mapping. Id 12 is accepted as a revision synonym
    /// for the same pair.
    pub fn from_id(id: u32, field_name: &str) -> Result<Self> {
        match id {
            0 => Ok(Predictor::Zero),
            1 => Ok(Predictor::Previous),
            2 => Ok(Predictor::StraightLine),
            3 => Ok(Predictor::Average2),
            4 => Ok(Predictor::MinThrottle),
            5 => Ok(Predictor::Motor0),
            6 => Ok(Predictor::Increment),
            7 | 12 => {
                if field_name == "GPS_coord[1]" {
                    Ok(Predictor::HomeCoord1)
                } else {
                    Ok(Predictor::HomeCoord0)
                }
            }
            8 => Ok(Predictor::Const1500),
            9 => Ok(Predictor::VbatRef),
            10 => Ok(Predictor::LastMainFrameTime),
            11 => Ok(Predictor::MinMotor),
            _ => Err(DecodeError::MalformedEncoding(format!(
                "unknown predictor id {}",
                id
            ))),
        }
    }

    /// Combine a raw decoded value with this predictor's baseline
    pub(crate) fn apply(&self, raw: i64, ctx: &PredictorContext) -> i64 {
        match self {
            Predictor::Zero => raw,
            Predictor::Previous => raw + ctx.last(ctx.field_index),
            Predictor::StraightLine => {
                raw + 2 * ctx.last(ctx.field_index) - ctx.last2(ctx.field_index)
            }
            Predictor::Average2 => {
                let sum = ctx.last(ctx.field_index) + ctx.last2(ctx.field_index);
                raw + sum.div_euclid(2)
            }
            Predictor::MinThrottle => raw + ctx.baselines.minthrottle,
            Predictor::Motor0 => {
                let motor0 = ctx
                    .motor0_index
                    .and_then(|index| ctx.current.get(index))
                    .copied()
                    .unwrap_or(0);
                raw + motor0
            }
            Predictor::Increment => {
                if ctx.frame_type == FrameType::Slow {
                    raw + ctx.last_slow(ctx.field_index) + 1
                } else {
                    raw + ctx.last(ctx.field_index) + 1 + ctx.skipped_frames
                }
            }
            Predictor::HomeCoord0 => match ctx.history.gps_home.first() {
                Some(home) => raw + home,
                None => 0,
            },
            Predictor::HomeCoord1 => match ctx.history.gps_home.get(1) {
                Some(home) => raw + home,
                None => 0,
            },
            Predictor::Const1500 => raw + 1500,
            Predictor::VbatRef => raw + ctx.baselines.vbatref,
            Predictor::LastMainFrameTime => {
                let time = ctx
                    .time_index
                    .map(|index| ctx.last(index))
                    .unwrap_or(0);
                raw + time
            }
            Predictor::MinMotor => raw + ctx.baselines.motor_min,
        }
    }
}

/// Header constants resolved once per session for the predictor engine
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HeaderBaselines {
    pub minthrottle: i64,
    pub vbatref: i64,
    pub motor_min: i64,
}

/// Everything a predictor may consult while one frame is being decoded
pub(crate) struct PredictorContext<'a> {
    pub frame_type: FrameType,
    /// Index of the field currently being reconstructed
    pub field_index: usize,
    /// Values of the current frame decoded so far
    pub current: &'a [i64],
    pub history: &'a History,
    pub baselines: &'a HeaderBaselines,
    /// Position of `time` in the main-frame field list
    pub time_index: Option<usize>,
    /// Position of `motor[0]` in the main-frame field list
    pub motor0_index: Option<usize>,
    /// Loop iterations the logging rhythm skipped since the last main frame
    pub skipped_frames: i64,
}

impl PredictorContext<'_> {
    fn last(&self, index: usize) -> i64 {
        self.history.last.get(index).copied().unwrap_or(0)
    }

    fn last2(&self, index: usize) -> i64 {
        self.history.last2.get(index).copied().unwrap_or(0)
    }

    fn last_slow(&self, index: usize) -> i64 {
        self.history.last_slow.get(index).copied().unwrap_or(0)
    }
}
