use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::{Context, Result};
use clap::{Args, Parser, ValueHint};
use prettytable::{cell, row};
use std::path::PathBuf;
use std::process::ExitCode;
use tauid_sf::container::Object;

#[derive(Args)]
#[group(multiple = false, required = true)]
struct Group {
    /// Show the name, type and number of bins of every object.
    #[arg(long, short)]
    objects: bool,
    /// Show the bins of the histogram with the given name.
    #[arg(long, value_name = "NAME")]
    histogram: Option<String>,
    /// Show the formula with the given name.
    #[arg(long, value_name = "NAME")]
    formula: Option<String>,
}

/// Read out the contents of a container.
#[derive(Parser)]
pub struct Opts {
    /// Path to the input container.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
    #[command(flatten)]
    group: Group,
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let container = helpers::read_container(&self.input)?;

        if let Some(name) = &self.group.formula {
            let Some(Object::Formula(formula)) = container.get(name) else {
                anyhow::bail!("no formula named `{name}`");
            };

            println!("name: {}", formula.name);
            println!(
                "domain: [{}, {}] x [{}, {}]",
                formula.x_min, formula.x_max, formula.y_min, formula.y_max
            );
            println!("expression: {}", formula.expression);

            return Ok(ExitCode::SUCCESS);
        }

        let mut table = helpers::create_table();

        if let Some(name) = &self.group.histogram {
            let histogram = match container.get(name) {
                Some(Object::Histogram(histogram)) => Some(histogram),
                _ => None,
            }
            .with_context(|| format!("no histogram named `{name}`"))?;

            table.set_titles(row![c => "b", "left", "right", "content", "error"]);

            for (bin, ((left, right), (content, error))) in histogram
                .limits()
                .pairs()
                .zip(histogram.contents().iter().zip(histogram.errors()))
                .enumerate()
            {
                let row = table.add_empty_row();
                row.add_cell(cell!(bin.to_string()));
                row.add_cell(cell!(r->format!("{left}")));
                row.add_cell(cell!(r->format!("{right}")));
                row.add_cell(cell!(r->format!("{content}")));
                row.add_cell(cell!(r->format!("{error}")));
            }
        } else {
            table.set_titles(row![c => "name", "type", "bins"]);

            for named in container.iter() {
                let bins = match &named.object {
                    Object::Histogram(histogram) => histogram.bins().to_string(),
                    _ => "-".to_owned(),
                };

                let row = table.add_empty_row();
                row.add_cell(cell!(l->named.name));
                row.add_cell(cell!(l->named.object.type_name()));
                row.add_cell(cell!(r->bins));
            }
        }

        table.printstd();

        Ok(ExitCode::SUCCESS)
    }
}
