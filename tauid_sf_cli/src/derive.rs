use super::helpers;
use super::plot::{self, EfficiencyPlot};
use super::{GlobalConfiguration, Subcommand};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueHint};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tauid_sf::container::{Container, Object};
use tauid_sf::formula::{self, Formula2D};
use tauid_sf::function::Sampling;
use tauid_sf::histogram_set::{HistogramKind, HistogramSet};
use tauid_sf::input::{self, Shift};
use tauid_sf::rebin::{self, RebinnedBins};
use tauid_sf::remap::{self, ScoreDict};
use tracing::info;

/// Derive score-binned scale factors from working-point scale factors and MC efficiencies.
#[derive(Parser)]
pub struct Opts {
    /// Container with the scale factors of every working point.
    #[arg(long, value_hint = ValueHint::FilePath)]
    sf: PathBuf,
    /// Container with the MC efficiencies of every working point.
    #[arg(long, value_hint = ValueHint::FilePath)]
    mc_eff: PathBuf,
    /// JSON file mapping working points to their score thresholds.
    #[arg(long, value_hint = ValueHint::FilePath)]
    wp_scores: PathBuf,
    /// Name of the kinematic variable used in plots.
    #[arg(default_value = "p_{T}", long)]
    var_name: String,
    /// Variation of the scale factors.
    #[arg(conflicts_with = "all_shifts", default_value = "cent", long)]
    shift: Shift,
    /// Derive the nominal, up and down variations.
    #[arg(long)]
    all_shifts: bool,
    /// Folder for the output container and the plot scripts.
    #[arg(default_value = ".", long, value_hint = ValueHint::DirPath)]
    output_folder: PathBuf,
    /// Name of the output container.
    #[arg(default_value = "TauIDScore_SF.yaml", long)]
    name: String,
    /// Use a logarithmic kinematic axis in plots.
    #[arg(long)]
    logx: bool,
    /// Minimum exclusive data efficiency of every slice but the tightest.
    #[arg(default_value_t = rebin::DEFAULT_THRESHOLD, long)]
    rebin_threshold: f64,
    /// Range over which scale-factor functions are sampled [default: domain of each function].
    #[arg(long, value_name = "MIN,MAX", value_parser = helpers::parse_range)]
    function_range: Option<(f64, f64)>,
    /// Number of points scale-factor functions are sampled at.
    #[arg(default_value_t = 100, long, value_parser = clap::value_parser!(u64).range(1..))]
    function_points: u64,
}

fn formula_name(shift: Shift) -> String {
    match shift {
        Shift::Cent => "sf".to_owned(),
        shift => format!("sf_{shift}"),
    }
}

fn tick_labels(working_points: &[String]) -> Vec<String> {
    working_points
        .iter()
        .enumerate()
        .map(|(index, wp)| {
            working_points
                .get(index + 1)
                .map_or_else(|| wp.clone(), |next| format!("{wp}&!{next}"))
        })
        .collect()
}

fn plot_working_points(
    set: &HistogramSet,
    folder: &Path,
    x_label: &str,
    logx: bool,
) -> Result<()> {
    for key in set.keys() {
        let (Some(mc), Some(data), Some(sf)) = (
            set.get(HistogramKind::Mc, key),
            set.get(HistogramKind::Data, key),
            set.get(HistogramKind::Sf, key),
        ) else {
            continue;
        };

        let script = plot::efficiencies_and_sf(
            &EfficiencyPlot {
                title: key,
                x_label,
                logx,
                ratio_range: (0.8, 1.2),
                ratio_lines: (0.9, 1.1),
                tick_labels: None,
            },
            mc,
            data,
            sf,
        );
        helpers::write_script(&folder.join(format!("effandsf_{key}.py")), &script)?;
    }

    Ok(())
}

fn plot_kinematic_bins(set: &HistogramSet, bins: &RebinnedBins, folder: &Path) -> Result<()> {
    for entry in bins.iter() {
        let key = entry.bin.label();
        let (Some(mc), Some(data), Some(sf)) = (
            set.get(HistogramKind::Mc, &key),
            set.get(HistogramKind::Data, &key),
            set.get(HistogramKind::Sf, &key),
        ) else {
            continue;
        };
        let labels = tick_labels(&entry.working_points);

        let script = plot::efficiencies_and_sf(
            &EfficiencyPlot {
                title: &key,
                x_label: "Working point",
                logx: false,
                ratio_range: (0.0, 2.0),
                ratio_lines: (0.5, 1.5),
                tick_labels: Some(&labels),
            },
            mc,
            data,
            sf,
        );
        helpers::write_script(&folder.join(format!("effandsf_{key}.py")), &script)?;
    }

    Ok(())
}

fn plot_scale_factors(set: &HistogramSet, folder: &Path) -> Result<()> {
    for (key, sf) in set.histograms(HistogramKind::Sf)? {
        let script = plot::scale_factor(key, sf);
        helpers::write_script(&folder.join(format!("sf_{key}.py")), &script)?;
    }

    Ok(())
}

impl Opts {
    fn sampling(&self) -> Result<Sampling> {
        Ok(Sampling {
            range: self.function_range,
            points: self.function_points.try_into()?,
        })
    }

    fn derive(
        &self,
        shift: Shift,
        containers: (&Container, &Container),
        scores: &ScoreDict,
        plots: bool,
    ) -> Result<Formula2D> {
        let (sf_container, mc_container) = containers;
        let scale_factors = input::load_scale_factors(sf_container, shift, &self.sampling()?)?;
        let mc_efficiencies = input::load_efficiencies(mc_container);

        let set = HistogramSet::new()
            .with_input(HistogramKind::Sf, scale_factors)
            .with_input(HistogramKind::Mc, mc_efficiencies);

        let Some(loosest) = set.keys().first() else {
            bail!("no working point is shared by the scale factors and the MC efficiencies");
        };
        info!("loosest working point is {loosest}");

        let loosest_sf = set
            .get(HistogramKind::Sf, loosest)
            .cloned()
            .with_context(|| format!("no scale factor for `{loosest}`"))?;

        let set = set
            .scale_by_histogram(HistogramKind::Sf, &loosest_sf, true)?
            .derive(HistogramKind::Data)?;

        if plots {
            let x_label = format!("${}$", self.var_name);
            plot_working_points(&set, &self.output_folder, &x_label, self.logx)?;
        }

        let (rebinned, bins) = rebin::rebin(&set, self.rebin_threshold)?;

        if plots {
            plot_kinematic_bins(&rebinned, &bins, &self.output_folder)?;
        }

        let rebinned = rebinned.scale_by_kinematic_bin(HistogramKind::Sf, &loosest_sf, false)?;
        let remapped = remap::remap(rebinned, &bins, scores)?;

        if plots {
            plot_scale_factors(&remapped, &self.output_folder)?;
        }

        Ok(formula::sf_formula(&remapped, &bins, &formula_name(shift))?)
    }
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let sf_container = helpers::read_container(&self.sf)?;
        let mc_container = helpers::read_container(&self.mc_eff)?;
        let scores = ScoreDict::read(&self.wp_scores)
            .with_context(|| format!("unable to read '{}'", self.wp_scores.display()))?;

        std::fs::create_dir_all(&self.output_folder).with_context(|| {
            format!("unable to create '{}'", self.output_folder.display())
        })?;

        let shifts = if self.all_shifts {
            Shift::ALL.to_vec()
        } else {
            vec![self.shift]
        };

        let mut output = Container::new();

        for (index, &shift) in shifts.iter().enumerate() {
            let formula = self.derive(shift, (&sf_container, &mc_container), &scores, index == 0)?;

            println!("SF formula:");
            println!("{} = {}", formula.name, formula.expression);

            let name = formula.name.clone();
            output.push(&name, Object::Formula(formula));
        }

        let path = self.output_folder.join(&self.name);
        helpers::write_container(&path, &output)?;

        println!("Created {}", path.display());

        Ok(ExitCode::SUCCESS)
    }
}
