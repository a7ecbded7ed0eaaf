use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::{bail, Result};
use clap::{Parser, ValueHint};
use std::path::PathBuf;
use std::process::ExitCode;
use tauid_sf::container::Object;

/// Evaluate a formula of a container at the given kinematic value and scores.
#[derive(Parser)]
#[command(allow_negative_numbers = true)]
pub struct Opts {
    /// Path to the input container.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
    /// Name of the formula.
    name: String,
    /// Value of the kinematic variable.
    x: f64,
    /// Scores the formula is evaluated at.
    #[arg(num_args = 1.., required = true)]
    y: Vec<f64>,
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let container = helpers::read_container(&self.input)?;

        let formula = match container.get(&self.name) {
            Some(Object::Formula(formula)) => formula.compile()?,
            Some(Object::Function(function)) => function.compile()?,
            Some(object) => bail!("`{}` is a {}, not a formula", self.name, object.type_name()),
            None => bail!("no formula named `{}`", self.name),
        };

        for &y in &self.y {
            println!("{} {y} {}", self.x, formula.eval(&[self.x, y]));
        }

        Ok(ExitCode::SUCCESS)
    }
}
