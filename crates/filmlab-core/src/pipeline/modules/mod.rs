mod curves;
mod film_curve;
mod gains;
mod hsl;
mod inversion;
mod lut3d;
mod split_tone;
mod tone_curve;

pub use curves::{CurveSet, is_neutral as curves_neutral};
pub use film_curve::FilmCurve;
pub use gains::Gains;
pub use hsl::HslAdjustments;
pub use inversion::Inversion;
pub use lut3d::CubeLookup;
pub use split_tone::SplitTone;
pub use tone_curve::{ToneCurve, build_tone_lut, is_neutral as tone_neutral};
