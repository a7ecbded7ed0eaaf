#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Tau identification scale factors, converted from discrete working points into bins of the
//! continuous discriminator score.
//!
//! The pipeline consists of the following steps, each taking the output of the previous one:
//!
//! 1. [`working_point::WorkingPointOrder`] sorts working points from loosest to tightest,
//! 2. [`histogram_set::HistogramSet`] collects MC efficiencies, data efficiencies and scale
//!    factors and derives the missing kind,
//! 3. [`rebin::rebin`] merges working-point slices until each has enough data efficiency,
//! 4. [`remap::remap`] moves the slices onto the score axis, and
//! 5. [`formula::sf_formula`] serializes the result as a two-dimensional formula.

mod convert;

pub mod bin;
pub mod container;
pub mod error;
pub mod formula;
pub mod function;
pub mod histogram;
pub mod histogram_set;
pub mod input;
pub mod rebin;
pub mod remap;
pub mod working_point;
