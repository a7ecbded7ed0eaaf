use anyhow::{Context, Result};
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
use prettytable::Table;
use std::path::Path;
use tauid_sf::container::Container;

pub fn create_table() -> Table {
    let mut table = Table::new();
    table.set_format(
        FormatBuilder::new()
            .column_separator(' ')
            .separator(LinePosition::Title, LineSeparator::new('-', '+', ' ', ' '))
            .build(),
    );
    table
}

pub fn read_container(input: &Path) -> Result<Container> {
    Container::read(input).with_context(|| format!("unable to read '{}'", input.display()))
}

pub fn write_container(output: &Path, container: &Container) -> Result<()> {
    container
        .write(output)
        .with_context(|| format!("unable to write '{}'", output.display()))
}

pub fn write_script(output: &Path, script: &str) -> Result<()> {
    std::fs::write(output, script)
        .with_context(|| format!("unable to write '{}'", output.display()))
}

pub fn parse_range(arg: &str) -> std::result::Result<(f64, f64), String> {
    let (min, max) = arg
        .split_once(',')
        .ok_or_else(|| format!("range '{arg}' must be given as MIN,MAX"))?;
    let min: f64 = min.trim().parse().map_err(|err| format!("{err}"))?;
    let max: f64 = max.trim().parse().map_err(|err| format!("{err}"))?;

    if min < max {
        Ok((min, max))
    } else {
        Err(format!("range '{arg}' is empty"))
    }
}
