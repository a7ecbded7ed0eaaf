use itertools::Itertools;
use tauid_sf::histogram::Histogram;

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "np.nan".to_owned()
    } else if value.is_infinite() && value.is_sign_positive() {
        "np.inf".to_owned()
    } else if value.is_infinite() {
        "-np.inf".to_owned()
    } else {
        format!("{value:e}")
    }
}

fn map_format_join(slice: &[f64]) -> String {
    slice.iter().copied().map(format_value).join(", ")
}

fn quote(text: &str) -> String {
    format!("r'{}'", text.replace('\'', "\\'"))
}

fn format_labels(labels: &[String]) -> String {
    labels.iter().map(|label| quote(label)).join(", ")
}

/// Options of [`efficiencies_and_sf`].
pub struct EfficiencyPlot<'a> {
    pub title: &'a str,
    pub x_label: &'a str,
    pub logx: bool,
    pub ratio_range: (f64, f64),
    pub ratio_lines: (f64, f64),
    /// Replaces the ticks of the x axis, one label per bin.
    pub tick_labels: Option<&'a [String]>,
}

/// Returns a matplotlib script drawing the MC and data efficiencies in the upper panel and the
/// scale factor in the lower one.
pub fn efficiencies_and_sf(
    plot: &EfficiencyPlot,
    mc: &Histogram,
    data: &Histogram,
    sf: &Histogram,
) -> String {
    let ticks = plot.tick_labels.map_or_else(
        || "None".to_owned(),
        |labels| {
            format!(
                "(np.array([{}]), [{}])",
                map_format_join(&mc.limits().centers()),
                format_labels(labels)
            )
        },
    );

    format!(
        "#!/usr/bin/env python3

import matplotlib.pyplot as plt
import numpy as np

title = {title}
xlabel = {x_label}
logx = {logx}
ratio_range = ({ratio_min}, {ratio_max})
ratio_lines = ({line_low}, {line_high})
ticks = {ticks}

edges = np.array([{edges}])
mc = np.array([{mc}])
mc_err = np.array([{mc_err}])
data = np.array([{data}])
data_err = np.array([{data_err}])
sf = np.array([{sf}])
sf_err = np.array([{sf_err}])

def main():
    centers = 0.5 * (edges[1:] + edges[:-1])
    fig, (upper, lower) = plt.subplots(2, 1, sharex=True, gridspec_kw={{'height_ratios': [3, 1]}})

    upper.set_title(title, loc='left')
    upper.stairs(mc, edges, label='MC')
    upper.errorbar(centers, mc, yerr=mc_err, fmt='none', color='C0')
    upper.stairs(data, edges, label='Data')
    upper.errorbar(centers, data, yerr=data_err, fmt='none', color='C1')
    upper.set_ylabel('Efficiency')
    upper.set_ylim(bottom=0.0)
    upper.legend()

    lower.stairs(sf, edges, color='k')
    lower.errorbar(centers, sf, yerr=sf_err, fmt='none', color='k')
    lower.axhline(1.0, color='grey', linewidth=0.5)
    for line in ratio_lines:
        lower.axhline(line, color='grey', linestyle='dashed', linewidth=0.5)
    lower.set_ylim(*ratio_range)
    lower.set_ylabel('Data/MC')
    lower.set_xlabel(xlabel)

    if logx:
        lower.set_xscale('log')
    if ticks is not None:
        lower.set_xticks(*ticks, rotation=315, ha='left')

    fig.savefig(__file__.removesuffix('.py') + '.pdf')
    plt.close(fig)

if __name__ == '__main__':
    main()
",
        title = quote(plot.title),
        x_label = quote(plot.x_label),
        logx = if plot.logx { "True" } else { "False" },
        ratio_min = format_value(plot.ratio_range.0),
        ratio_max = format_value(plot.ratio_range.1),
        line_low = format_value(plot.ratio_lines.0),
        line_high = format_value(plot.ratio_lines.1),
        ticks = ticks,
        edges = map_format_join(mc.limits().limits()),
        mc = map_format_join(mc.contents()),
        mc_err = map_format_join(mc.errors()),
        data = map_format_join(data.contents()),
        data_err = map_format_join(data.errors()),
        sf = map_format_join(sf.contents()),
        sf_err = map_format_join(sf.errors()),
    )
}

/// Returns a matplotlib script drawing the scale factor `sf` against the score.
pub fn scale_factor(title: &str, sf: &Histogram) -> String {
    format!(
        "#!/usr/bin/env python3

import matplotlib.pyplot as plt
import numpy as np

title = {title}

edges = np.array([{edges}])
sf = np.array([{sf}])
sf_err = np.array([{sf_err}])

def main():
    centers = 0.5 * (edges[1:] + edges[:-1])
    fig, axis = plt.subplots()

    axis.set_title(title, loc='left')
    axis.stairs(sf, edges, color='k')
    axis.errorbar(centers, sf, yerr=sf_err, fmt='none', color='k')
    axis.axhline(1.0, color='grey', linewidth=0.5)
    axis.set_xlabel('Score')
    axis.set_ylabel('Scale Factor')

    fig.savefig(__file__.removesuffix('.py') + '.pdf')
    plt.close(fig)

if __name__ == '__main__':
    main()
",
        title = quote(title),
        edges = map_format_join(sf.limits().limits()),
        sf = map_format_join(sf.contents()),
        sf_err = map_format_join(sf.errors()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tauid_sf::bin::BinLimits;

    #[test]
    fn non_finite_values() {
        assert_eq!(
            map_format_join(&[0.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY]),
            "5e-1, np.nan, np.inf, -np.inf"
        );
    }

    #[test]
    fn tick_labels() {
        let histogram = Histogram::from_contents(BinLimits::unit(2), vec![0.5, 0.25]).unwrap();
        let labels = ["Loose&!Tight".to_owned(), "Tight".to_owned()];
        let script = efficiencies_and_sf(
            &EfficiencyPlot {
                title: "20.0to40.0",
                x_label: "Working point",
                logx: false,
                ratio_range: (0.0, 2.0),
                ratio_lines: (0.5, 1.5),
                tick_labels: Some(&labels),
            },
            &histogram,
            &histogram,
            &histogram,
        );

        assert!(script.contains("ticks = (np.array([5e-1, 1.5e0]), [r'Loose&!Tight', r'Tight'])"));
        assert!(script.contains("edges = np.array([0e0, 1e0, 2e0])"));
        assert!(script.contains("logx = False"));
    }

    #[test]
    fn quotes_in_titles() {
        let histogram = Histogram::from_contents(BinLimits::unit(1), vec![1.0]).unwrap();
        let script = efficiencies_and_sf(
            &EfficiencyPlot {
                title: "Tau's WP",
                x_label: "$p_{T}$ ('GeV')",
                logx: true,
                ratio_range: (0.8, 1.2),
                ratio_lines: (0.9, 1.1),
                tick_labels: None,
            },
            &histogram,
            &histogram,
            &histogram,
        );

        assert!(script.contains("title = r'Tau\\'s WP'\n"));
        assert!(script.contains("xlabel = r'$p_{T}$ (\\'GeV\\')'\n"));
        assert!(script.contains("ticks = None"));

        let script = scale_factor("20.0to40.0 'inclusive'", &histogram);
        assert!(script.contains("title = r'20.0to40.0 \\'inclusive\\''\n"));
    }
}
