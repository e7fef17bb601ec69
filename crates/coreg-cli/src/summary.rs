use console::Style;
use coreg_core::pipeline::config::CoregConfig;
use coreg_core::pipeline::{CoregReport, ShiftResult};
use coreg_core::Coreg;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    good: Style,
    warning: Style,
    bad: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            good: Style::new().green().bold(),
            warning: Style::new().yellow(),
            bad: Style::new().red().bold(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_header(coreg: &Coreg) {
    let s = Styles::new();
    let config = coreg.config();
    let rec = coreg.reconciliation();

    println!();
    println!("  {}", s.title.apply_to("Co-registration"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(15)));
    println!();
    println!(
        "  {:<14}{} (band {})",
        s.label.apply_to("Reference"),
        s.path.apply_to(coreg.reference().display_name()),
        config.ref_band
    );
    println!(
        "  {:<14}{} (band {})",
        s.label.apply_to("Target"),
        s.path.apply_to(coreg.target().display_name()),
        config.tgt_band
    );
    let crs = if rec.pixel_coordinates {
        "pixel coordinates".to_string()
    } else {
        coreg.reference().projection.to_string()
    };
    println!("  {:<14}{}", s.label.apply_to("CRS"), s.value.apply_to(crs));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Grid"),
        s.value.apply_to(format!("{} x {}", rec.resolution.0, rec.resolution.1.abs()))
    );
    print_estimator(&s, config);
    println!();
}

fn print_estimator(s: &Styles, config: &CoregConfig) {
    println!();
    println!("  {}", s.header.apply_to("Estimator"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sub-pixel"),
        s.method.apply_to(config.estimator.subpixel)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Taper"),
        s.method.apply_to(config.estimator.taper)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Resampling"),
        s.method.apply_to(config.estimator.resamp_alg_calc)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Max iter"),
        s.value.apply_to(config.estimator.max_iter)
    );
    if let Some(position) = config.window.position {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Window at"),
            s.value.apply_to(position)
        );
    }
}

pub fn print_shift(result: &ShiftResult) {
    let s = Styles::new();

    println!("  {}", s.header.apply_to("Shift"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Pixels"),
        s.value.apply_to(format!("dx = {:+.3}, dy = {:+.3}", result.dx_px, result.dy_px))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Map units"),
        s.value.apply_to(format!("dx = {:+.3}, dy = {:+.3}", result.dx_map, result.dy_map))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Vector"),
        s.value.apply_to(format!(
            "{:.3} at {:.1}\u{b0}",
            result.vector_length_map(),
            result.vector_angle_deg()
        ))
    );
    let reliability = format!(
        "{:.1}% (peak ratio {:.2})",
        result.reliability, result.peak_ratio
    );
    let reliability = if result.is_reliable {
        s.good.apply_to(reliability)
    } else {
        s.warning.apply_to(reliability)
    };
    println!("    {:<12}{}", s.label.apply_to("Reliability"), reliability);
    println!(
        "    {:<12}{}",
        s.label.apply_to("Window"),
        s.value.apply_to(format!(
            "{}x{} at ({:.3}, {:.3})",
            result.window_size.0, result.window_size.1, result.window_center.0, result.window_center.1
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(result.iterations)
    );
    if let (Some(before), Some(after)) = (result.ssim_before, result.ssim_after) {
        let ssim = format!("{:.4} -> {:.4}", before, after);
        let ssim = if after >= before {
            s.good.apply_to(ssim)
        } else {
            s.warning.apply_to(ssim)
        };
        println!("    {:<12}{}", s.label.apply_to("SSIM"), ssim);
    }
}

pub fn print_advisories(coreg: &Coreg) {
    if coreg.advisories().is_empty() {
        return;
    }
    let s = Styles::new();
    println!();
    println!("  {}", s.header.apply_to("Advisories"));
    for advisory in coreg.advisories() {
        println!("    {}", s.warning.apply_to(advisory));
    }
}

pub fn print_batch_table(reports: &[CoregReport]) {
    let s = Styles::new();

    println!();
    println!(
        "  {:<24}{:<24}{:>10}{:>10}{:>10}  {}",
        s.header.apply_to("Reference"),
        s.header.apply_to("Target"),
        s.header.apply_to("dx_map"),
        s.header.apply_to("dy_map"),
        s.header.apply_to("Rel. %"),
        s.header.apply_to("Status")
    );
    for report in reports {
        match (&report.shift, &report.failure) {
            (Some(shift), _) => {
                let status = if shift.is_reliable {
                    s.good.apply_to("ok".to_string())
                } else {
                    s.warning.apply_to("unreliable".to_string())
                };
                println!(
                    "  {:<24}{:<24}{:>10.3}{:>10.3}{:>10.1}  {}",
                    report.reference,
                    report.target,
                    shift.dx_map,
                    shift.dy_map,
                    shift.reliability,
                    status
                );
            }
            (None, failure) => {
                println!(
                    "  {:<24}{:<24}{:>10}{:>10}{:>10}  {}",
                    report.reference,
                    report.target,
                    "-",
                    "-",
                    "-",
                    s.bad.apply_to(failure.as_deref().unwrap_or("not run"))
                );
            }
        }
    }

    let succeeded = reports.iter().filter(|r| r.success).count();
    println!();
    println!(
        "  {} of {} pairs succeeded",
        s.value.apply_to(succeeded),
        reports.len()
    );
}
